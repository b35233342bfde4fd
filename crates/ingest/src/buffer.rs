//! 배치 버퍼 -- 보존된 이벤트를 모아 배치 단위로 내보냅니다.
//!
//! [`BatchBuffer`]는 도착 순서대로 이벤트를 쌓고, 임계값에 도달하면 즉시,
//! 또는 플러시 타이머가 호출하면 임계값 미만이라도 배치를 내보냅니다.
//! 내보낸 배치는 새 벡터와 교체되므로 버퍼의 내부 저장소와 별칭 관계가 없습니다.
//!
//! 버퍼는 플러시 태스크가 단독으로 소유하므로 잠금이 필요 없습니다.

use filewatch_core::types::AccessEvent;

/// 기본 배치 임계값
pub const DEFAULT_BATCH_THRESHOLD: usize = 100;

/// 인메모리 배치 버퍼
pub struct BatchBuffer {
    /// 버퍼 내부 저장소
    events: Vec<AccessEvent>,
    /// 플러시 임계값
    threshold: usize,
    /// 총 유입 이벤트 카운터
    total_received: u64,
    /// 내보낸 배치 카운터
    batches_flushed: u64,
}

impl BatchBuffer {
    /// 새 배치 버퍼를 생성합니다. 임계값 0은 1로 취급합니다.
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            events: Vec::with_capacity(threshold.min(10_000)),
            threshold,
            total_received: 0,
            batches_flushed: 0,
        }
    }

    /// 이벤트를 추가합니다.
    pub fn add(&mut self, event: AccessEvent) {
        self.total_received += 1;
        self.events.push(event);
    }

    /// 임계값에 도달했으면 배치를 내보냅니다.
    pub fn flush_if_due(&mut self) -> Option<Vec<AccessEvent>> {
        if self.events.len() >= self.threshold {
            Some(self.take())
        } else {
            None
        }
    }

    /// 비어 있지 않으면 임계값과 무관하게 배치를 내보냅니다.
    pub fn force_flush(&mut self) -> Option<Vec<AccessEvent>> {
        if self.events.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> Vec<AccessEvent> {
        self.batches_flushed += 1;
        let fresh = Vec::with_capacity(self.threshold.min(10_000));
        std::mem::replace(&mut self.events, fresh)
    }

    /// 현재 버퍼에 쌓인 이벤트 수
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// 버퍼가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// 플러시 임계값
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// 총 유입 이벤트 수
    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    /// 내보낸 배치 수
    pub fn batches_flushed(&self) -> u64 {
        self.batches_flushed
    }
}

impl Default for BatchBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_THRESHOLD)
    }
}
