//! 수집 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`IngestConfig`](filewatch_core::config::IngestConfig)를
//! 기반으로 파이프라인 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```
//! use filewatch_core::config::FilewatchConfig;
//! use filewatch_ingest::config::PipelineConfig;
//!
//! let core_config = FilewatchConfig::default();
//! let config = PipelineConfig::from_core(&core_config.ingest);
//! assert_eq!(config.batch_size, 100);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use filewatch_core::config::IngestConfig;

use crate::error::IngestError;
use crate::filter::FilterPatterns;
use crate::parser::ParserConfig;
use crate::source::SourceCommand;

const MAX_BATCH_SIZE: usize = 100_000;
const MAX_CHANNEL_CAPACITY: usize = 10_000_000;
const MAX_INTERVAL_SECS: u64 = 3600; // 1 hour
const MIN_LINE_LENGTH: usize = 64;

/// 수집 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 프로듀서 프로그램
    pub source_program: String,
    /// 프로듀서 인자
    pub source_args: Vec<String>,
    /// 배치 크기 (이 개수만큼 모이면 플러시)
    pub batch_size: usize,
    /// 배치 플러시 간격 (초)
    pub flush_interval_secs: u64,
    /// 디바운스 윈도우 (밀리초)
    pub debounce_ms: u64,
    /// 중복 제거 캐시 보존 기간 (초)
    pub dedup_retention_secs: u64,
    /// 중복 제거 캐시 정리 주기 (초)
    pub dedup_cleanup_interval_secs: u64,
    /// 파서 -> 배치 버퍼 채널 용량
    pub channel_capacity: usize,
    /// 최대 라인 길이
    pub max_line_length: usize,
    /// `unlink` 추적 여부
    pub track_unlink: bool,
    /// 세션 시작 시 패턴을 주지 않았을 때 쓰는 기본 필터
    pub default_filters: FilterPatterns,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&IngestConfig::default())
    }
}

impl PipelineConfig {
    /// core의 `IngestConfig`에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &IngestConfig) -> Self {
        Self {
            source_program: core.source_program.clone(),
            source_args: core.source_args.clone(),
            batch_size: core.batch_size,
            flush_interval_secs: core.flush_interval_secs,
            debounce_ms: core.debounce_ms,
            dedup_retention_secs: core.dedup_retention_secs,
            dedup_cleanup_interval_secs: core.dedup_cleanup_interval_secs,
            channel_capacity: core.channel_capacity,
            max_line_length: core.max_line_length,
            track_unlink: core.track_unlink,
            default_filters: FilterPatterns::new(
                core.include_pattern.as_str(),
                core.exclude_pattern.as_str(),
                core.process_pattern.as_str(),
            ),
        }
    }

    /// 프로듀서 명령
    pub fn source_command(&self) -> SourceCommand {
        SourceCommand::new(self.source_program.clone(), self.source_args.clone())
    }

    /// 라인 파서 설정
    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            track_unlink: self.track_unlink,
            max_line_length: self.max_line_length,
        }
    }

    /// 플러시 간격
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    /// 디바운스 윈도우
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// 중복 제거 캐시 보존 기간
    pub fn dedup_retention(&self) -> Duration {
        Duration::from_secs(self.dedup_retention_secs)
    }

    /// 중복 제거 캐시 정리 주기
    pub fn dedup_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.dedup_cleanup_interval_secs)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.source_program.trim().is_empty() {
            return Err(IngestError::Config {
                field: "source_program".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(IngestError::Config {
                field: "batch_size".to_owned(),
                reason: format!("must be 1-{}", MAX_BATCH_SIZE),
            });
        }

        if self.flush_interval_secs == 0 || self.flush_interval_secs > MAX_INTERVAL_SECS {
            return Err(IngestError::Config {
                field: "flush_interval_secs".to_owned(),
                reason: format!("must be 1-{}", MAX_INTERVAL_SECS),
            });
        }

        if self.dedup_cleanup_interval_secs == 0
            || self.dedup_cleanup_interval_secs > MAX_INTERVAL_SECS
        {
            return Err(IngestError::Config {
                field: "dedup_cleanup_interval_secs".to_owned(),
                reason: format!("must be 1-{}", MAX_INTERVAL_SECS),
            });
        }

        // 보존 기간이 디바운스보다 짧으면 정리가 디바운스를 깨뜨림
        if self.dedup_retention() < self.debounce() {
            return Err(IngestError::Config {
                field: "dedup_retention_secs".to_owned(),
                reason: "must not be shorter than the debounce window".to_owned(),
            });
        }

        if self.channel_capacity == 0 || self.channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(IngestError::Config {
                field: "channel_capacity".to_owned(),
                reason: format!("must be 1-{}", MAX_CHANNEL_CAPACITY),
            });
        }

        if self.max_line_length < MIN_LINE_LENGTH {
            return Err(IngestError::Config {
                field: "max_line_length".to_owned(),
                reason: format!("must be at least {}", MIN_LINE_LENGTH),
            });
        }

        Ok(())
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 프로듀서 명령을 설정합니다.
    pub fn source(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.config.source_program = program.into();
        self.config.source_args = args;
        self
    }

    /// 배치 크기를 설정합니다.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// 플러시 간격(초)을 설정합니다.
    pub fn flush_interval_secs(mut self, secs: u64) -> Self {
        self.config.flush_interval_secs = secs;
        self
    }

    /// 디바운스 윈도우(밀리초)를 설정합니다.
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.debounce_ms = ms;
        self
    }

    /// 중복 제거 캐시 보존 기간과 정리 주기(초)를 설정합니다.
    pub fn dedup_retention(mut self, retention_secs: u64, cleanup_interval_secs: u64) -> Self {
        self.config.dedup_retention_secs = retention_secs;
        self.config.dedup_cleanup_interval_secs = cleanup_interval_secs;
        self
    }

    /// 채널 용량을 설정합니다.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// `unlink` 추적 여부를 설정합니다.
    pub fn track_unlink(mut self, track: bool) -> Self {
        self.config.track_unlink = track;
        self
    }

    /// 기본 필터를 설정합니다.
    pub fn default_filters(mut self, filters: FilterPatterns) -> Self {
        self.config.default_filters = filters.normalized();
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, IngestError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
