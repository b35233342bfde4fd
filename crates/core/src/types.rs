//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 파서가 만들고, 필터/중복 제거/배치 버퍼를 거쳐 저장소로 흘러가는
//! 파일 접근 이벤트와 그 부속 타입을 정의합니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 추적 대상 파일 시스템 연산
///
/// 트레이스 도구 출력의 두 번째 필드 토큰과 1:1로 대응합니다.
/// 직렬화 시 원래 토큰(`"open_nocancel"` 등)을 그대로 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Open,
    OpenNocancel,
    Close,
    CloseNocancel,
    Create,
    Rename,
    Truncate,
    Ftruncate,
    Fsync,
    Read,
    ReadNocancel,
    Write,
    WriteNocancel,
    Pread,
    Pwrite,
    Readv,
    Writev,
    Fwrite,
    Fread,
    /// 삭제 연산. 파서 설정(`track_unlink`)이 켜진 경우에만 이벤트가 됩니다.
    Unlink,
}

impl Operation {
    /// 모든 연산 목록
    pub const ALL: [Operation; 20] = [
        Self::Open,
        Self::OpenNocancel,
        Self::Close,
        Self::CloseNocancel,
        Self::Create,
        Self::Rename,
        Self::Truncate,
        Self::Ftruncate,
        Self::Fsync,
        Self::Read,
        Self::ReadNocancel,
        Self::Write,
        Self::WriteNocancel,
        Self::Pread,
        Self::Pwrite,
        Self::Readv,
        Self::Writev,
        Self::Fwrite,
        Self::Fread,
        Self::Unlink,
    ];

    /// 트레이스 출력 토큰을 연산으로 변환합니다.
    ///
    /// 어휘에 없는 토큰이면 `None`을 반환합니다.
    pub fn from_token(token: &str) -> Option<Self> {
        let op = match token {
            "open" => Self::Open,
            "open_nocancel" => Self::OpenNocancel,
            "close" => Self::Close,
            "close_nocancel" => Self::CloseNocancel,
            "create" => Self::Create,
            "rename" => Self::Rename,
            "truncate" => Self::Truncate,
            "ftruncate" => Self::Ftruncate,
            "fsync" => Self::Fsync,
            "read" => Self::Read,
            "read_nocancel" => Self::ReadNocancel,
            "write" => Self::Write,
            "write_nocancel" => Self::WriteNocancel,
            "pread" => Self::Pread,
            "pwrite" => Self::Pwrite,
            "readv" => Self::Readv,
            "writev" => Self::Writev,
            "fwrite" => Self::Fwrite,
            "fread" => Self::Fread,
            "unlink" => Self::Unlink,
            _ => return None,
        };
        Some(op)
    }

    /// 트레이스 출력 토큰 문자열을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::OpenNocancel => "open_nocancel",
            Self::Close => "close",
            Self::CloseNocancel => "close_nocancel",
            Self::Create => "create",
            Self::Rename => "rename",
            Self::Truncate => "truncate",
            Self::Ftruncate => "ftruncate",
            Self::Fsync => "fsync",
            Self::Read => "read",
            Self::ReadNocancel => "read_nocancel",
            Self::Write => "write",
            Self::WriteNocancel => "write_nocancel",
            Self::Pread => "pread",
            Self::Pwrite => "pwrite",
            Self::Readv => "readv",
            Self::Writev => "writev",
            Self::Fwrite => "fwrite",
            Self::Fread => "fread",
            Self::Unlink => "unlink",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 파일 접근 이벤트
///
/// 관측된 파일 시스템 연산 하나를 나타냅니다.
/// `file_path`는 항상 비어 있지 않으며, 파서는 조건을 만족하지 못하는
/// 라인에 대해 이벤트를 만들지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    /// 수집 시각 (원본 라인의 타임스탬프가 아닌 파이프라인 기준)
    pub timestamp: DateTime<Utc>,
    /// 프로세스 이름
    pub process_name: String,
    /// 프로세스 ID (파싱 실패 시 0)
    pub pid: u32,
    /// 절대 파일 경로
    pub file_path: String,
    /// 연산 종류
    pub operation: Operation,
}

impl AccessEvent {
    /// 이 이벤트의 중복 제거 키를 만듭니다.
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            process_name: self.process_name.clone(),
            file_path: self.file_path.clone(),
            operation: self.operation,
        }
    }
}

impl fmt::Display for AccessEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}[{}] {}",
            self.operation, self.process_name, self.pid, self.file_path,
        )
    }
}

/// 중복 제거 키 -- "같은 논리적 접근"을 식별합니다.
///
/// 저장되지 않으며 중복 제거 캐시 안에서만 사용됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub process_name: String,
    pub file_path: String,
    pub operation: Operation,
}
