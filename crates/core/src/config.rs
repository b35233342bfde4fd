//! 설정 관리 -- filewatch.toml 파싱 및 런타임 설정
//!
//! [`FilewatchConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`FILEWATCH_INGEST_BATCH_SIZE=200` 형식)
//! 3. 설정 파일 (`filewatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), filewatch_core::error::FilewatchError> {
//! use filewatch_core::config::FilewatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = FilewatchConfig::load("filewatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = FilewatchConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, FilewatchError};

/// filewatch 통합 설정
///
/// `filewatch.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilewatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 수집 파이프라인 설정
    #[serde(default)]
    pub ingest: IngestConfig,
    /// 인메모리 저장소 설정
    #[serde(default)]
    pub store: StoreConfig,
}

impl FilewatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, FilewatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, FilewatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FilewatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                FilewatchError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, FilewatchError> {
        toml::from_str(toml_str).map_err(|e| {
            FilewatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `FILEWATCH_{SECTION}_{FIELD}`
    /// 예: `FILEWATCH_INGEST_BATCH_SIZE=200`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "FILEWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "FILEWATCH_GENERAL_LOG_FORMAT");

        // Ingest
        override_string(
            &mut self.ingest.source_program,
            "FILEWATCH_INGEST_SOURCE_PROGRAM",
        );
        override_args(&mut self.ingest.source_args, "FILEWATCH_INGEST_SOURCE_ARGS");
        override_usize(&mut self.ingest.batch_size, "FILEWATCH_INGEST_BATCH_SIZE");
        override_u64(
            &mut self.ingest.flush_interval_secs,
            "FILEWATCH_INGEST_FLUSH_INTERVAL_SECS",
        );
        override_u64(&mut self.ingest.debounce_ms, "FILEWATCH_INGEST_DEBOUNCE_MS");
        override_u64(
            &mut self.ingest.dedup_retention_secs,
            "FILEWATCH_INGEST_DEDUP_RETENTION_SECS",
        );
        override_u64(
            &mut self.ingest.dedup_cleanup_interval_secs,
            "FILEWATCH_INGEST_DEDUP_CLEANUP_INTERVAL_SECS",
        );
        override_usize(
            &mut self.ingest.channel_capacity,
            "FILEWATCH_INGEST_CHANNEL_CAPACITY",
        );
        override_usize(
            &mut self.ingest.max_line_length,
            "FILEWATCH_INGEST_MAX_LINE_LENGTH",
        );
        override_bool(&mut self.ingest.track_unlink, "FILEWATCH_INGEST_TRACK_UNLINK");
        override_string(
            &mut self.ingest.include_pattern,
            "FILEWATCH_INGEST_INCLUDE_PATTERN",
        );
        override_string(
            &mut self.ingest.exclude_pattern,
            "FILEWATCH_INGEST_EXCLUDE_PATTERN",
        );
        override_string(
            &mut self.ingest.process_pattern,
            "FILEWATCH_INGEST_PROCESS_PATTERN",
        );

        // Store
        override_usize(&mut self.store.max_records, "FILEWATCH_STORE_MAX_RECORDS");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), FilewatchError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.ingest.source_program.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ingest.source_program".to_owned(),
                reason: "source program must not be empty".to_owned(),
            }
            .into());
        }

        if self.ingest.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingest.batch_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.ingest.flush_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingest.flush_interval_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.ingest.dedup_cleanup_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingest.dedup_cleanup_interval_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.ingest.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingest.channel_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.store.max_records == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store.max_records".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 수집 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 트레이스 라인을 출력하는 프로듀서 프로그램
    pub source_program: String,
    /// 프로듀서 인자
    pub source_args: Vec<String>,
    /// 배치 크기 (이 개수만큼 모이면 즉시 플러시)
    pub batch_size: usize,
    /// 주기적 플러시 간격 (초)
    pub flush_interval_secs: u64,
    /// 동일 접근 디바운스 윈도우 (밀리초)
    pub debounce_ms: u64,
    /// 중복 제거 캐시 엔트리 보존 기간 (초)
    pub dedup_retention_secs: u64,
    /// 중복 제거 캐시 정리 주기 (초)
    pub dedup_cleanup_interval_secs: u64,
    /// 파서 -> 배치 버퍼 내부 채널 용량
    pub channel_capacity: usize,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// `unlink` 연산 추적 여부
    pub track_unlink: bool,
    /// 기본 포함 경로 패턴 (빈 문자열 = 제한 없음)
    pub include_pattern: String,
    /// 기본 제외 경로 패턴
    pub exclude_pattern: String,
    /// 기본 프로세스 패턴
    pub process_pattern: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_program: "sudo".to_owned(),
            source_args: vec![
                "fs_usage".to_owned(),
                "-w".to_owned(),
                "-f".to_owned(),
                "filesystem".to_owned(),
            ],
            batch_size: 100,
            flush_interval_secs: 5,
            debounce_ms: 500,
            dedup_retention_secs: 30,
            dedup_cleanup_interval_secs: 30,
            channel_capacity: 10_000,
            max_line_length: 64 * 1024,
            track_unlink: false,
            include_pattern: String::new(),
            exclude_pattern: String::new(),
            process_pattern: String::new(),
        }
    }
}

/// 인메모리 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 보관할 최대 레코드 수
    pub max_records: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_records: 100_000,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

/// 공백으로 구분된 인자 목록 (`"fs_usage -w -f filesystem"`)
fn override_args(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val.split_whitespace().map(str::to_owned).collect();
    }
}
