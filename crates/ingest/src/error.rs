//! 수집 파이프라인 에러 타입
//!
//! [`IngestError`]는 수집 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<IngestError> for FilewatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 잘못된 형식의 입력 라인은 에러가 아닙니다. 파서는 `None`을 반환하고
//! 파이프라인은 해당 라인을 조용히 버립니다.

use filewatch_core::error::{FilewatchError, PipelineError};

/// 수집 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 와일드카드 패턴 문법 오류
    #[error("invalid wildcard pattern '{pattern}': {reason}")]
    Pattern {
        /// 원본 패턴
        pattern: String,
        /// 실패 사유
        reason: String,
    },

    /// 프로듀서 프로세스 시작/파이프 실패
    #[error("source error: {command}: {reason}")]
    Source {
        /// 실행하려던 명령줄
        command: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 이미 세션이 실행 중
    #[error("monitoring session already running")]
    AlreadyRunning,

    /// 실행 중인 세션이 없음
    #[error("no monitoring session is running")]
    NotRunning,

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<IngestError> for FilewatchError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::AlreadyRunning => FilewatchError::Pipeline(PipelineError::AlreadyRunning),
            IngestError::NotRunning => FilewatchError::Pipeline(PipelineError::NotRunning),
            IngestError::Io(e) => FilewatchError::Io(e),
            other => FilewatchError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_error_display() {
        let err = IngestError::Pattern {
            pattern: "[abc".to_owned(),
            reason: "unterminated character class".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("[abc"));
        assert!(msg.contains("unterminated"));
    }

    #[test]
    fn source_error_names_command() {
        let err = IngestError::Source {
            command: "sudo fs_usage -w -f filesystem".to_owned(),
            reason: "No such file or directory".to_owned(),
        };
        assert!(err.to_string().contains("fs_usage"));
    }

    #[test]
    fn session_rejections_map_to_pipeline_errors() {
        let err: FilewatchError = IngestError::AlreadyRunning.into();
        assert!(matches!(
            err,
            FilewatchError::Pipeline(PipelineError::AlreadyRunning)
        ));

        let err: FilewatchError = IngestError::NotRunning.into();
        assert!(matches!(err, FilewatchError::Pipeline(PipelineError::NotRunning)));
    }

    #[test]
    fn other_errors_convert_to_init_failed() {
        let err = IngestError::Config {
            field: "batch_size".to_owned(),
            reason: "must be 1-100000".to_owned(),
        };
        let top: FilewatchError = err.into();
        assert!(matches!(
            top,
            FilewatchError::Pipeline(PipelineError::InitFailed(_))
        ));
        assert!(top.to_string().contains("batch_size"));
    }
}
