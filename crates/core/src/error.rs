//! 에러 타입 -- 도메인별 에러 정의

/// filewatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum FilewatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 모니터링 세션이 실행 중
    #[error("already running")]
    AlreadyRunning,

    /// 실행 중인 모니터링 세션이 없음
    #[error("not running")]
    NotRunning,

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 연결 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 쿼리 실패
    #[error("query failed: {0}")]
    Query(String),

    /// 저장소가 쓰기를 거부함
    #[error("write rejected: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_carry_descriptive_reason() {
        let cases = [
            (PipelineError::AlreadyRunning, "already running"),
            (PipelineError::NotRunning, "not running"),
            (
                PipelineError::InitFailed("spawn failed".to_owned()),
                "pipeline init failed: spawn failed",
            ),
        ];
        for (err, expected) in cases {
            // 세션 생명주기 에러만 존재 (채널 전송은 실패하지 않고 드롭으로 처리)
            match &err {
                PipelineError::AlreadyRunning
                | PipelineError::NotRunning
                | PipelineError::InitFailed(_) => {}
            }
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn storage_error_converts_to_top_level() {
        let err: FilewatchError = StorageError::Query("table missing".to_owned()).into();
        assert!(matches!(err, FilewatchError::Storage(_)));
        assert!(err.to_string().contains("table missing"));
    }

    #[test]
    fn config_error_display_names_field() {
        let err = ConfigError::InvalidValue {
            field: "ingest.batch_size".to_owned(),
            reason: "must be 1-100000".to_owned(),
        };
        assert!(err.to_string().contains("ingest.batch_size"));
    }
}
