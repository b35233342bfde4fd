//! 인메모리 저장소 -- 용량 제한 링 버퍼
//!
//! [`MemoryStore`]는 [`EventSink`]를 구현하고 조회 API를 제공합니다.
//!
//! # 오버플로우 정책
//! 레코드 수가 `max_records`를 넘으면 가장 오래된 레코드부터 하나씩 제거합니다.
//! 배치는 하나의 쓰기 잠금 안에서 추가되므로 조회자는 배치의 일부만 보지 않습니다.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use filewatch_core::config::StoreConfig;
use filewatch_core::error::StorageError;
use filewatch_core::metrics as m;
use filewatch_core::sink::EventSink;
use filewatch_core::types::AccessEvent;

/// 저장된 접근 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAccess {
    /// 레코드 ID (1부터 단조 증가)
    pub id: u64,
    /// 저장 시각
    pub created_at: DateTime<Utc>,
    /// 원본 이벤트
    #[serde(flatten)]
    pub event: AccessEvent,
}

/// 프로세스별 접근 횟수
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessAccessCount {
    pub process_name: String,
    pub count: u64,
}

/// 저장소 통계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// 현재 보관 중인 레코드 수
    pub current_records: usize,
    /// 최대 보관 레코드 수
    pub max_records: usize,
    /// 다음에 부여할 레코드 ID
    pub next_id: u64,
}

struct Inner {
    records: VecDeque<StoredAccess>,
    max_records: usize,
    next_id: u64,
    evicted: u64,
}

impl Inner {
    fn push(&mut self, event: AccessEvent, created_at: DateTime<Utc>) {
        let id = self.next_id;
        self.next_id += 1;
        self.records.push_back(StoredAccess {
            id,
            created_at,
            event,
        });
    }

    /// 용량을 넘는 오래된 레코드를 제거하고 제거 수를 반환합니다.
    fn trim(&mut self) -> usize {
        let excess = self.records.len().saturating_sub(self.max_records);
        for _ in 0..excess {
            self.records.pop_front();
        }
        self.evicted += excess as u64;
        excess
    }

    fn publish_gauge(&self) {
        metrics::gauge!(m::STORE_RECORDS).set(self.records.len() as f64);
    }

    /// 최신 레코드부터 조건에 맞는 것을 `limit`개까지 모읍니다.
    fn newest<F>(&self, limit: usize, mut predicate: F) -> Vec<StoredAccess>
    where
        F: FnMut(&StoredAccess) -> bool,
    {
        self.records
            .iter()
            .rev()
            .filter(|record| predicate(record))
            .take(limit)
            .cloned()
            .collect()
    }
}

/// 인메모리 이벤트 저장소
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// 최대 레코드 수를 지정해 저장소를 만듭니다. 0은 1로 취급합니다.
    pub fn new(max_records: usize) -> Self {
        let max_records = max_records.max(1);
        Self {
            inner: RwLock::new(Inner {
                records: VecDeque::with_capacity(max_records.min(10_000)),
                max_records,
                next_id: 1,
                evicted: 0,
            }),
        }
    }

    /// 설정에서 저장소를 만듭니다.
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.max_records)
    }

    /// 최근 레코드를 최신순으로 반환합니다.
    pub async fn recent(&self, limit: usize) -> Vec<StoredAccess> {
        self.inner.read().await.newest(limit, |_| true)
    }

    /// `start`와 `end` 사이(양 끝 제외)에 수집된 레코드를 최신순으로 반환합니다.
    pub async fn by_time_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<StoredAccess> {
        self.inner.read().await.newest(usize::MAX, |record| {
            record.event.timestamp > start && record.event.timestamp < end
        })
    }

    /// 프로세스 이름이 정확히 일치하는 레코드를 최신순으로 반환합니다.
    pub async fn by_process(&self, process_name: &str, limit: usize) -> Vec<StoredAccess> {
        self.inner
            .read()
            .await
            .newest(limit, |record| record.event.process_name == process_name)
    }

    /// 경로가 `prefix`로 시작하는 레코드를 최신순으로 반환합니다.
    pub async fn by_path_prefix(&self, prefix: &str, limit: usize) -> Vec<StoredAccess> {
        self.inner
            .read()
            .await
            .newest(limit, |record| record.event.file_path.starts_with(prefix))
    }

    /// 프로세스별 접근 횟수를 많은 순으로 반환합니다.
    ///
    /// 횟수가 같으면 프로세스 이름순입니다.
    pub async fn count_by_process(&self) -> Vec<ProcessAccessCount> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        {
            let inner = self.inner.read().await;
            for record in &inner.records {
                *counts.entry(record.event.process_name.clone()).or_default() += 1;
            }
        }

        let mut counts: Vec<ProcessAccessCount> = counts
            .into_iter()
            .map(|(process_name, count)| ProcessAccessCount {
                process_name,
                count,
            })
            .collect();
        counts.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.process_name.cmp(&b.process_name))
        });
        counts
    }

    /// 저장소 통계
    pub async fn stats(&self) -> StoreStats {
        let inner = self.inner.read().await;
        StoreStats {
            current_records: inner.records.len(),
            max_records: inner.max_records,
            next_id: inner.next_id,
        }
    }

    /// 용량 초과로 지금까지 제거된 레코드 수
    pub async fn evicted_count(&self) -> u64 {
        self.inner.read().await.evicted
    }

    /// 최대 레코드 수를 바꿉니다. 0은 무시하며, 줄어들면 오래된 레코드를 제거합니다.
    pub async fn set_max_records(&self, max_records: usize) {
        if max_records == 0 {
            tracing::warn!("ignoring max_records of 0");
            return;
        }

        let mut inner = self.inner.write().await;
        inner.max_records = max_records;
        let evicted = inner.trim();
        inner.publish_gauge();
        if evicted > 0 {
            tracing::info!(evicted, max_records, "store capacity reduced");
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::from_config(&StoreConfig::default())
    }
}

impl EventSink for MemoryStore {
    async fn insert_one(&self, event: AccessEvent) -> Result<(), StorageError> {
        self.insert_batch(vec![event]).await
    }

    async fn insert_batch(&self, events: Vec<AccessEvent>) -> Result<(), StorageError> {
        if events.is_empty() {
            return Ok(());
        }

        let created_at = Utc::now();
        let count = events.len();

        let mut inner = self.inner.write().await;
        for event in events {
            inner.push(event, created_at);
        }
        let evicted = inner.trim();
        inner.publish_gauge();

        if evicted > 0 {
            tracing::debug!(
                evicted,
                capacity = inner.max_records,
                "store full, dropped oldest records"
            );
        }
        tracing::trace!(count, total = inner.records.len(), "stored batch");
        Ok(())
    }
}
