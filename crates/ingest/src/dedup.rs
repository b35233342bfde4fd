//! 중복 제거 캐시 -- 짧은 간격으로 반복되는 동일 접근을 하나로 합칩니다.
//!
//! [`DedupCache`]는 `DedupKey -> 마지막 관측 시각`을 유지합니다.
//! 디바운스 윈도우 안에 다시 들어온 키는 억제되고, 그렇지 않으면 수용되며
//! 관측 시각이 갱신됩니다. 주기적인 [`DedupCache::cleanup`]이 보존 기간이 지난
//! 키를 제거해 메모리를 제한합니다.
//!
//! 반복 횟수는 보존하지 않습니다.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use filewatch_core::types::DedupKey;

/// 기본 디바운스 윈도우
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// 기본 엔트리 보존 기간
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30);

/// 디바운스 기반 중복 제거 캐시
#[derive(Debug)]
pub struct DedupCache {
    debounce: Duration,
    retention: Duration,
    last_seen: HashMap<DedupKey, Instant>,
    suppressed: u64,
}

impl DedupCache {
    /// 새 캐시를 생성합니다.
    pub fn new(debounce: Duration, retention: Duration) -> Self {
        Self {
            debounce,
            retention,
            last_seen: HashMap::new(),
            suppressed: 0,
        }
    }

    /// `key`를 억제해야 하면 `true`를 반환합니다.
    ///
    /// 수용된 경우 마지막 관측 시각이 `now`로 갱신됩니다.
    /// 억제된 경우 시각은 그대로 두므로, 연속 버스트라도 윈도우가 끝나면 다시 수용됩니다.
    pub fn should_suppress(&mut self, key: &DedupKey, now: Instant) -> bool {
        if let Some(last) = self.last_seen.get_mut(key) {
            if now.saturating_duration_since(*last) < self.debounce {
                self.suppressed += 1;
                return true;
            }
            *last = now;
            return false;
        }

        self.last_seen.insert(key.clone(), now);
        false
    }

    /// 보존 기간보다 오래된 키를 제거하고 제거된 개수를 반환합니다.
    pub fn cleanup(&mut self, now: Instant) -> usize {
        let before = self.last_seen.len();
        let retention = self.retention;
        self.last_seen
            .retain(|_, last| now.saturating_duration_since(*last) <= retention);
        before - self.last_seen.len()
    }

    /// 추적 중인 키 수
    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    /// 추적 중인 키가 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }

    /// 지금까지 억제된 이벤트 수
    pub fn suppressed_count(&self) -> u64 {
        self.suppressed
    }

    /// 디바운스 윈도우
    pub fn debounce(&self) -> Duration {
        self.debounce
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE, DEFAULT_RETENTION)
    }
}
