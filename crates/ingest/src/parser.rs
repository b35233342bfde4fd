//! 라인 파서 -- 트레이스 도구 출력 한 줄을 [`AccessEvent`]로 변환합니다.
//!
//! 입력 라인 예시 (`fs_usage -w -f filesystem`):
//! ```text
//! 12:00:00.123456  write   F=3   B=0x10   /Users/a/doc.txt   0.000012   myapp.123
//! ```
//!
//! - 두 번째 필드: 연산
//! - 마지막 필드: `프로세스이름.PID`
//! - `/`로 시작하는 첫 필드: 파일 경로 (없으면 잘린 경로 복구 시도)
//!
//! 이벤트가 될 수 없는 라인은 에러가 아니라 `None`입니다.
//! 어떤 입력 문자열에 대해서도 패닉하지 않습니다.

use chrono::{DateTime, Utc};

use filewatch_core::types::{AccessEvent, Operation};

/// 기본 최대 라인 길이 (64KB)
const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// 최소 필드 수 (시각, 연산, ..., 프로세스)
const MIN_FIELDS: usize = 4;

/// 잘린 경로로 보이는 필드의 표식
const TRUNCATED_MARKERS: &[&str] = &["/Volumes/", "Library/", "/Users/"];

/// 잘린 앞부분 -> 복원할 접두사
const TRUNCATED_STEMS: &[(&str, &str)] = &[
    ("ystem/", "/S"),
    ("olumes/", "/V"),
    ("ibrary/", "/L"),
    ("sers/", "/U"),
];

/// 라인 파서 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// `unlink` 연산을 이벤트로 만들지 여부
    pub track_unlink: bool,
    /// 이보다 긴 라인은 노이즈로 간주
    pub max_line_length: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            track_unlink: false,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// 트레이스 라인 파서
///
/// 상태가 없으며 여러 태스크에서 공유해도 안전합니다.
#[derive(Debug, Clone, Default)]
pub struct LineParser {
    config: ParserConfig,
}

impl LineParser {
    /// 기본 설정으로 파서를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 지정한 설정으로 파서를 생성합니다.
    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// 파서 설정
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// 라인을 파싱합니다. 수집 시각은 현재 시각입니다.
    pub fn parse(&self, line: &str) -> Option<AccessEvent> {
        self.parse_at(line, Utc::now())
    }

    /// 지정한 수집 시각으로 라인을 파싱합니다.
    pub fn parse_at(&self, line: &str, timestamp: DateTime<Utc>) -> Option<AccessEvent> {
        if line.len() > self.config.max_line_length {
            return None;
        }
        // 경로가 있을 수 없는 라인 (헤더, 빈 줄 등)
        if !line.contains('/') {
            return None;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < MIN_FIELDS {
            return None;
        }

        let operation = Operation::from_token(fields[1])?;
        if !self.is_tracked(operation) {
            return None;
        }

        let (process_name, pid) = split_process_info(fields[fields.len() - 1]);
        let file_path = extract_file_path(&fields)?;

        Some(AccessEvent {
            timestamp,
            process_name: process_name.to_owned(),
            pid,
            file_path,
            operation,
        })
    }

    fn is_tracked(&self, operation: Operation) -> bool {
        match operation {
            Operation::Unlink => self.config.track_unlink,
            _ => true,
        }
    }
}

/// `name.pid` 형식의 프로세스 정보를 분리합니다.
///
/// 마지막 `.`을 기준으로 나누며, `.`이 맨 앞/맨 뒤에 있거나 PID가
/// 숫자가 아니거나 0이면 필드 전체가 이름이고 PID는 0입니다.
pub fn split_process_info(info: &str) -> (&str, u32) {
    if let Some(dot) = info.rfind('.')
        && dot > 0
        && dot < info.len() - 1
    {
        match info[dot + 1..].parse::<u32>() {
            Ok(pid) if pid != 0 => return (&info[..dot], pid),
            _ => {}
        }
    }
    (info, 0)
}

/// 필드 목록에서 파일 경로를 찾습니다.
///
/// `/`로 시작하는 첫 필드를 우선하고, 없으면 [`recover_truncated_path`]를
/// 타임스탬프 이후 필드에 적용합니다.
fn extract_file_path(fields: &[&str]) -> Option<String> {
    if let Some(path) = fields.iter().find(|f| f.starts_with('/')) {
        return Some((*path).to_owned());
    }

    fields
        .iter()
        .skip(1)
        .find_map(|field| recover_truncated_path(field))
}

/// 앞부분이 잘린 경로 필드를 복구합니다.
///
/// `/Volumes/`, `Library/`, `/Users/` 중 하나를 포함하는 필드만 대상입니다.
/// `ystem/`, `olumes/`, `ibrary/`, `sers/`로 시작하면 잘린 대문자를 되살리고,
/// 그 외에는 `/`만 붙입니다. 대상이 아니면 `None`입니다.
///
/// ```
/// use filewatch_ingest::parser::recover_truncated_path;
///
/// assert_eq!(
///     recover_truncated_path("ystem/Library/Fonts/a.ttf").as_deref(),
///     Some("/System/Library/Fonts/a.ttf"),
/// );
/// assert_eq!(recover_truncated_path("F=3"), None);
/// ```
pub fn recover_truncated_path(field: &str) -> Option<String> {
    if !TRUNCATED_MARKERS.iter().any(|marker| field.contains(marker)) {
        return None;
    }

    let restored = TRUNCATED_STEMS
        .iter()
        .find(|(stem, _)| field.starts_with(stem))
        .map(|(_, head)| format!("{head}{field}"))
        .unwrap_or_else(|| format!("/{field}"));
    Some(restored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Option<AccessEvent> {
        LineParser::new().parse(line)
    }

    #[test]
    fn parses_basic_write_line() {
        let event = parse("12:00:00 write F=3 /Users/a/doc.txt myapp.123").unwrap();
        assert_eq!(event.operation, Operation::Write);
        assert_eq!(event.process_name, "myapp");
        assert_eq!(event.pid, 123);
        assert_eq!(event.file_path, "/Users/a/doc.txt");
    }

    #[test]
    fn parses_realistic_fs_usage_line() {
        let line = "12:34:56.789012  open_nocancel   F=12  (R_____)  /Applications/Safari.app/Contents/Info.plist   0.000034   Safari.4242";
        let event = parse(line).unwrap();
        assert_eq!(event.operation, Operation::OpenNocancel);
        assert_eq!(event.process_name, "Safari");
        assert_eq!(event.pid, 4242);
        assert_eq!(
            event.file_path,
            "/Applications/Safari.app/Contents/Info.plist"
        );
    }

    #[test]
    fn parse_at_uses_given_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let event = LineParser::new()
            .parse_at("12:00:00 read F=3 /Users/a/doc.txt myapp.1", ts)
            .unwrap();
        assert_eq!(event.timestamp, ts);
    }

    #[test]
    fn rejects_line_without_slash() {
        assert!(parse("12:00:00 write F=3 doc.txt myapp.123").is_none());
        assert!(parse("").is_none());
        assert!(parse("TIMESTAMP CALL FILENAME PROCESS").is_none());
    }

    #[test]
    fn rejects_too_few_fields() {
        assert!(parse("write /Users/a/doc.txt myapp.1").is_none());
    }

    #[test]
    fn rejects_unknown_operation() {
        assert!(parse("12:00:00 stat64 F=3 /Users/a/doc.txt myapp.123").is_none());
        assert!(parse("12:00:00 getattrlist /Users/a/doc.txt 0.0001 myapp.123").is_none());
    }

    #[test]
    fn unlink_is_excluded_by_default() {
        let line = "12:00:00 unlink /Users/a/doc.txt 0.0001 myapp.123";
        assert!(parse(line).is_none());

        let tracking = LineParser::with_config(ParserConfig {
            track_unlink: true,
            ..Default::default()
        });
        let event = tracking.parse(line).unwrap();
        assert_eq!(event.operation, Operation::Unlink);
    }

    #[test]
    fn rejects_overlong_line() {
        let parser = LineParser::with_config(ParserConfig {
            max_line_length: 32,
            ..Default::default()
        });
        let line = "12:00:00 write F=3 /Users/a/a-very-long-document-name.txt myapp.123";
        assert!(parser.parse(line).is_none());
    }

    #[test]
    fn process_info_splitting() {
        let cases: &[(&str, (&str, u32))] = &[
            ("myapp.123", ("myapp", 123)),
            ("com.apple.Safari.99", ("com.apple.Safari", 99)),
            ("myapp", ("myapp", 0)),
            (".123", (".123", 0)),
            ("myapp.", ("myapp.", 0)),
            ("myapp.0", ("myapp.0", 0)),
            ("myapp.abc", ("myapp.abc", 0)),
            ("myapp.-5", ("myapp.-5", 0)),
            ("my.app.77", ("my.app", 77)),
        ];
        for (input, expected) in cases {
            assert_eq!(split_process_info(input), *expected, "input {input}");
        }
    }

    #[test]
    fn truncated_path_recovery_table() {
        let cases: &[(&str, Option<&str>)] = &[
            ("ystem/Library/Fonts/a.ttf", Some("/System/Library/Fonts/a.ttf")),
            ("olumes/Data/x/Library/y", Some("/Volumes/Data/x/Library/y")),
            ("ibrary/Application/Library/x", Some("/Library/Application/Library/x")),
            ("ibrary/Preferences/x.plist", None),
            ("sers/a/Library/Mail/m", Some("/Users/a/Library/Mail/m")),
            ("me/Library/x", Some("/me/Library/x")),
            ("x/Volumes/y", Some("/x/Volumes/y")),
            ("relative/dir/file.txt", None),
            ("F=3", None),
            ("", None),
        ];
        for (field, expected) in cases {
            assert_eq!(
                recover_truncated_path(field).as_deref(),
                *expected,
                "field {field}"
            );
        }
    }

    #[test]
    fn truncated_path_used_when_no_absolute_field() {
        let event = parse("12:00:00 read F=5 ystem/Library/Frameworks/x.dylib 0.0001 launchd.1").unwrap();
        assert_eq!(event.file_path, "/System/Library/Frameworks/x.dylib");
    }

    #[test]
    fn truncated_marker_in_timestamp_field_is_ignored() {
        // 첫 필드(타임스탬프 위치)는 복구 대상이 아님
        assert!(parse("Library/x read F=5 plain-field myapp.1").is_none());
    }

    #[test]
    fn absolute_path_wins_over_truncated_field() {
        let event =
            parse("12:00:00 read ibrary/Caches/x /Users/a/real.txt myapp.1").unwrap();
        assert_eq!(event.file_path, "/Users/a/real.txt");
    }

    #[test]
    fn line_with_slash_but_no_recoverable_path_is_rejected() {
        assert!(parse("12:00:00 write F=3 B=0x1/2 myapp.123").is_none());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_input_does_not_panic(line in ".{0,512}") {
                let _ = LineParser::new().parse(&line);
            }

            #[test]
            fn lines_without_slash_are_rejected(line in "[^/]{0,200}") {
                prop_assert!(LineParser::new().parse(&line).is_none());
            }

            #[test]
            fn well_formed_lines_parse_exactly(
                op_index in 0usize..19,
                path in "/[a-zA-Z0-9_.]{1,12}(/[a-zA-Z0-9_.]{1,12}){0,5}",
                name in "[a-zA-Z][a-zA-Z0-9_]{0,15}",
                pid in 1u32..100_000,
            ) {
                // Unlink를 제외한 19개 연산
                let op = Operation::ALL[op_index];
                let line = format!("12:00:00.000001 {} F=3 {} 0.000010 {}.{}", op.as_str(), path, name, pid);
                let event = LineParser::new().parse(&line);
                prop_assert!(event.is_some());
                let event = event.unwrap();
                prop_assert_eq!(event.operation, op);
                prop_assert_eq!(event.file_path, path);
                prop_assert_eq!(event.process_name, name);
                prop_assert_eq!(event.pid, pid);
            }
        }
    }
}
