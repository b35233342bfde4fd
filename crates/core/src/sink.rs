//! 저장소 경계 trait -- 파이프라인이 배치를 흘려보내는 지점
//!
//! 인메모리 링 버퍼든 관계형 저장소든 파이프라인에는 이 두 연산만 노출합니다.
//! 두 연산 모두 부분 가시성이 없어야 합니다: 배치 전체가 조회 가능해지거나,
//! 호출자가 에러를 관측하거나 둘 중 하나입니다. 배치 간 트랜잭션은 보장하지 않습니다.

use std::future::Future;

use crate::error::StorageError;
use crate::types::AccessEvent;

/// 이벤트 저장소 trait
///
/// 새 저장소 백엔드를 추가하려면 이 trait을 구현합니다.
/// 배치의 소유권은 호출 시점에 저장소로 넘어갑니다.
pub trait EventSink: Send + Sync {
    /// 이벤트 하나를 저장합니다.
    fn insert_one(
        &self,
        event: AccessEvent,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// 배치를 원자적으로 저장합니다.
    fn insert_batch(
        &self,
        events: Vec<AccessEvent>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}
