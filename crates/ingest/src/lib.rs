#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`wildcard`]: glob 유사 패턴 매처 (`**/` 재귀 형식 및 폴백 규칙)
//! - [`parser`]: 트레이스 라인 -> [`AccessEvent`](filewatch_core::AccessEvent) 파서, 잘린 경로 복구
//! - [`filter`]: 세션 필터 스냅샷과 정적 무시 목록
//! - [`dedup`]: 디바운스 기반 중복 제거 캐시
//! - [`buffer`]: 크기/시간 기준 배치 버퍼
//! - [`source`]: 프로듀서 프로세스 실행 및 라인 리더
//! - [`coordinator`]: 세션 상태 머신과 백그라운드 태스크 오케스트레이션
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입

pub mod buffer;
pub mod config;
pub mod coordinator;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod parser;
pub mod source;
pub mod wildcard;

// --- 주요 타입 re-export ---

// 코디네이터
pub use coordinator::{Coordinator, CoordinatorBuilder, PipelineStats, SessionInfo};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::IngestError;

// 파이프라인 단계
pub use buffer::BatchBuffer;
pub use dedup::DedupCache;
pub use filter::{FilterPatterns, FilterSet};
pub use parser::{LineParser, ParserConfig};
pub use source::SourceCommand;
pub use wildcard::{WildcardPattern, wildcard_match};
