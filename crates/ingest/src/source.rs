//! 라인 소스 -- 트레이스 프로듀서 프로세스의 실행과 표준 출력 읽기
//!
//! [`SourceCommand`]는 프로듀서 명령(기본값 `sudo fs_usage -w -f filesystem`)을
//! 표준 출력 파이프와 함께 실행합니다. 종료는 강제 종료(kill)이며,
//! 파이프에 남아 있던 라인은 버려집니다.
//!
//! [`LineReader`]는 최대 라인 길이만큼만 버퍼에 담습니다. 개행 없이 길게 이어지는
//! 출력은 다음 개행까지 읽어 버리므로 메모리 사용량이 라인 길이에 묶입니다.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::warn;

use crate::error::IngestError;

/// 프로듀서 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCommand {
    program: String,
    args: Vec<String>,
}

/// 실행된 프로듀서와 그 표준 출력 리더
pub struct SpawnedSource {
    /// 프로듀서 프로세스 핸들
    pub child: Child,
    /// 표준 출력 라인 리더
    pub lines: LineReader<ChildStdout>,
}

impl SourceCommand {
    /// 새 명령을 만듭니다.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// 기본 `fs_usage` 명령
    pub fn fs_usage() -> Self {
        Self::new(
            "sudo",
            ["fs_usage", "-w", "-f", "filesystem"]
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
        )
    }

    /// 사용자에게 보여줄 명령줄 문자열
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 프로듀서를 실행합니다.
    ///
    /// `max_line_length`보다 긴 출력 라인은 리더에서 버려집니다.
    /// 실행이나 파이프 획득에 실패하면 [`IngestError::Source`]를 반환합니다.
    /// 반환된 `Child`가 드롭되면 프로세스도 종료됩니다.
    pub fn spawn(&self, max_line_length: usize) -> Result<SpawnedSource, IngestError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| IngestError::Source {
                command: self.command_line(),
                reason: e.to_string(),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| IngestError::Source {
            command: self.command_line(),
            reason: "failed to capture stdout".to_owned(),
        })?;

        tracing::debug!(
            command = %self.command_line(),
            pid = child.id(),
            "spawned trace producer"
        );

        Ok(SpawnedSource {
            child,
            lines: LineReader::new(stdout, max_line_length),
        })
    }
}

impl Default for SourceCommand {
    fn default() -> Self {
        Self::fs_usage()
    }
}

/// 라인 버퍼 초기 용량
const INITIAL_CAPACITY: usize = 512;

/// 긴 라인을 읽은 뒤에도 유지하는 최대 버퍼 용량
const RETAINED_CAPACITY: usize = 8 * 1024;

/// 한 번의 버퍼 읽기 결과
enum LineRead {
    Eof,
    Line,
    Oversized(usize),
}

/// 바이트 스트림을 라인 단위로 읽는 리더
///
/// UTF-8이 아닌 바이트는 대체 문자로 바꿔 읽기를 계속합니다.
/// 경로에 비 UTF-8 바이트가 섞여도 스트림 전체가 멈추지 않습니다.
pub struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    max_line_length: usize,
    discarded: u64,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// 새 리더를 만듭니다. `max_line_length`를 넘는 라인은 건너뜁니다.
    pub fn new(reader: R, max_line_length: usize) -> Self {
        Self {
            inner: BufReader::new(reader),
            buf: Vec::with_capacity(INITIAL_CAPACITY),
            max_line_length,
            discarded: 0,
        }
    }

    /// 길이 초과로 버린 라인 수
    pub fn discarded_lines(&self) -> u64 {
        self.discarded
    }

    /// 다음 라인을 읽습니다. EOF이면 `None`입니다.
    ///
    /// 끝의 `\n`, `\r\n`은 제거됩니다. 길이 초과 라인은 경고 후 건너뜁니다.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            match self.read_bounded().await? {
                LineRead::Eof => return Ok(None),
                LineRead::Line => {
                    let line = String::from_utf8_lossy(&self.buf).into_owned();
                    self.release_capacity();
                    return Ok(Some(line));
                }
                LineRead::Oversized(length) => {
                    self.discarded += 1;
                    self.release_capacity();
                    warn!(
                        length,
                        max_line_length = self.max_line_length,
                        discarded = self.discarded,
                        "discarding oversized producer line"
                    );
                }
            }
        }
    }

    /// 개행까지 읽되 `max_line_length + 1` 바이트까지만 버퍼에 담습니다.
    /// (`\r\n`의 `\r` 한 바이트 여유)
    async fn read_bounded(&mut self) -> std::io::Result<LineRead> {
        self.buf.clear();
        let limit = self.max_line_length.saturating_add(1);
        let mut total = 0usize;

        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                if total == 0 {
                    return Ok(LineRead::Eof);
                }
                break;
            }

            let (used, content, newline) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, i, true),
                None => (available.len(), available.len(), false),
            };
            let room = limit.saturating_sub(self.buf.len());
            self.buf.extend_from_slice(&available[..content.min(room)]);
            total = total.saturating_add(content);
            self.inner.consume(used);

            if newline {
                break;
            }
        }

        let complete = total == self.buf.len();
        if complete && self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        if !complete || self.buf.len() > self.max_line_length {
            return Ok(LineRead::Oversized(total));
        }
        Ok(LineRead::Line)
    }

    fn release_capacity(&mut self) {
        if self.buf.capacity() > RETAINED_CAPACITY {
            self.buf.clear();
            self.buf.shrink_to(RETAINED_CAPACITY);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_command_line() {
        assert_eq!(
            SourceCommand::default().command_line(),
            "sudo fs_usage -w -f filesystem"
        );
    }

    #[test]
    fn command_line_without_args() {
        let cmd = SourceCommand::new("cat", Vec::new());
        assert_eq!(cmd.command_line(), "cat");
    }

    #[tokio::test]
    async fn line_reader_splits_and_trims() {
        let input: &[u8] = b"first\nsecond\r\nthird";
        let mut reader = LineReader::new(input, 1024);
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("second"));
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("third"));
        assert_eq!(reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn line_reader_tolerates_invalid_utf8() {
        let input: &[u8] = b"12:00:00 read /Users/a/\xff.txt app.1\nnext\n";
        let mut reader = LineReader::new(input, 1024);
        let line = reader.next_line().await.unwrap().unwrap();
        assert!(line.starts_with("12:00:00 read /Users/a/"));
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn spawn_missing_program_is_source_error() {
        let cmd = SourceCommand::new("/nonexistent/filewatch-producer", Vec::new());
        let err = cmd.spawn(1024).err().unwrap();
        assert!(matches!(err, IngestError::Source { .. }));
        assert!(err.to_string().contains("/nonexistent/filewatch-producer"));
    }

    #[tokio::test]
    async fn spawned_process_output_is_readable() {
        let cmd = SourceCommand::new(
            "sh",
            vec!["-c".to_owned(), "echo hello; echo world".to_owned()],
        );
        let SpawnedSource { mut child, mut lines } = cmd.spawn(1024).unwrap();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("hello"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("world"));
        assert_eq!(lines.next_line().await.unwrap(), None);
        child.wait().await.unwrap();
    }

    #[tokio::test]
    async fn oversized_line_is_skipped() {
        let mut input = vec![b'x'; 1024 * 1024];
        input.extend_from_slice(b"\nshort\n");
        let mut reader = LineReader::new(input.as_slice(), 64);

        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("short"));
        assert_eq!(reader.discarded_lines(), 1);
        assert!(reader.buf.capacity() <= RETAINED_CAPACITY);
        assert_eq!(reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_line_without_newline_is_skipped_at_eof() {
        let input = vec![b'y'; 256 * 1024];
        let mut reader = LineReader::new(input.as_slice(), 64);

        assert_eq!(reader.next_line().await.unwrap(), None);
        assert_eq!(reader.discarded_lines(), 1);
        assert!(reader.buf.capacity() <= RETAINED_CAPACITY);
    }

    #[tokio::test]
    async fn line_at_limit_is_kept() {
        let input: &[u8] = b"12345678\r\n123456789\nend\n";
        let mut reader = LineReader::new(input, 8);

        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("12345678"));
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("end"));
        assert_eq!(reader.discarded_lines(), 1);
    }
}
