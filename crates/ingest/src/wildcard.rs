//! 와일드카드 매처 -- 경로/프로세스 이름과 glob 유사 패턴의 매칭
//!
//! [`WildcardPattern`]은 패턴을 한 번만 컴파일하고 이후 이벤트마다 재사용합니다.
//! 매칭은 아래 순서의 폴백 체인이며, 첫 번째 성공에서 멈춥니다.
//!
//! 1. 전체 문자열 glob 매칭 (`*` = 임의 길이, `?` = 한 글자, `[a-z]` 클래스, `\` 이스케이프).
//!    `*`는 `/`도 넘어갑니다 (경로 세그먼트 경계 없음).
//! 2. `prefix**/suffix`: prefix 제거 후 남은 경로의 모든 디렉토리 경계에서 suffix를 glob 매칭
//! 3. `*suffix`: 후보가 suffix로 끝남
//! 4. `prefix*`: 후보가 prefix로 시작함
//! 5. `*`가 2개 이상: `*`로 분할한 세그먼트가 순서대로 등장 (탐욕적, 백트래킹 없음)
//!
//! 문법이 잘못된 패턴은 어떤 후보와도 매칭되지 않습니다.
//!
//! # 사용 예시
//! ```
//! use filewatch_ingest::wildcard::WildcardPattern;
//!
//! let pattern = WildcardPattern::new("/Users/**/*.txt").unwrap();
//! assert!(pattern.matches("/Users/a/docs/notes.txt"));
//! assert!(!pattern.matches("/Users/a/docs/notes.md"));
//! ```

use regex::Regex;

use crate::error::IngestError;

/// 재귀 하강 형식 (`prefix**/suffix`)
#[derive(Debug, Clone)]
struct RecursiveForm {
    prefix: String,
    /// suffix 자체가 잘못된 glob이면 `None` (규칙 2만 실패)
    suffix: Option<Regex>,
}

/// 컴파일된 와일드카드 패턴
///
/// 세션 시작 시 한 번 컴파일되어 읽기 전용으로 공유됩니다.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    raw: String,
    /// 전체 패턴의 glob 정규식. `None`이면 잘못된 패턴.
    glob: Option<Regex>,
    recursive: Option<RecursiveForm>,
    star_count: usize,
}

impl WildcardPattern {
    /// 패턴을 컴파일합니다.
    ///
    /// glob 문법이 잘못되었으면 [`IngestError::Pattern`]을 반환합니다.
    pub fn new(pattern: &str) -> Result<Self, IngestError> {
        let glob = compile_glob(pattern).map_err(|reason| IngestError::Pattern {
            pattern: pattern.to_owned(),
            reason,
        })?;
        Ok(Self::from_parts(pattern, Some(glob)))
    }

    /// 패턴을 컴파일하되, 실패하면 경고를 남기고 아무것도 매칭하지 않는 패턴을 만듭니다.
    ///
    /// 필터 패턴처럼 모니터링을 중단시키면 안 되는 입력에 사용합니다.
    pub fn new_lenient(pattern: &str) -> Self {
        match Self::new(pattern) {
            Ok(compiled) => compiled,
            Err(e) => {
                tracing::warn!(
                    pattern,
                    error = %e,
                    "invalid wildcard pattern, it will match nothing"
                );
                Self::from_parts(pattern, None)
            }
        }
    }

    fn from_parts(pattern: &str, glob: Option<Regex>) -> Self {
        let recursive = {
            let parts: Vec<&str> = pattern.split("**/").collect();
            if parts.len() == 2 {
                Some(RecursiveForm {
                    prefix: parts[0].to_owned(),
                    suffix: compile_glob(parts[1]).ok(),
                })
            } else {
                None
            }
        };

        Self {
            raw: pattern.to_owned(),
            glob,
            recursive,
            star_count: pattern.matches('*').count(),
        }
    }

    /// 원본 패턴 문자열
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// glob 문법이 올바른지 여부
    pub fn is_valid(&self) -> bool {
        self.glob.is_some()
    }

    /// 후보 문자열이 패턴과 매칭되는지 확인합니다.
    pub fn matches(&self, candidate: &str) -> bool {
        let Some(glob) = &self.glob else {
            return false;
        };

        // 1. 전체 glob
        if glob.is_match(candidate) {
            return true;
        }

        // 2. prefix**/suffix
        if let Some(recursive) = &self.recursive
            && recursive.matches(candidate)
        {
            return true;
        }

        // 3. *suffix
        if let Some(suffix) = self.raw.strip_prefix('*')
            && candidate.ends_with(suffix)
        {
            return true;
        }

        // 4. prefix*
        if let Some(prefix) = self.raw.strip_suffix('*')
            && candidate.starts_with(prefix)
        {
            return true;
        }

        // 5. 다중 와일드카드
        if self.star_count > 1 {
            return segments_in_order(candidate, &self.raw);
        }

        false
    }
}

impl RecursiveForm {
    fn matches(&self, candidate: &str) -> bool {
        let Some(suffix) = &self.suffix else {
            return false;
        };
        let Some(rest) = candidate.strip_prefix(self.prefix.as_str()) else {
            return false;
        };

        // rest, 그리고 각 '/' 다음 위치부터의 꼬리 경로
        std::iter::once(0)
            .chain(rest.match_indices('/').map(|(i, _)| i + 1))
            .any(|start| suffix.is_match(&rest[start..]))
    }
}

/// 패턴을 한 번 컴파일해 매칭합니다.
///
/// 핫 패스에서는 [`WildcardPattern`]을 미리 만들어 재사용하세요.
pub fn wildcard_match(candidate: &str, pattern: &str) -> bool {
    WildcardPattern::new_lenient(pattern).matches(candidate)
}

/// `*`로 분할한 세그먼트가 첫/끝 고정 및 순서대로 등장하는지 확인합니다.
fn segments_in_order(candidate: &str, pattern: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();

    if let Some(first) = segments.first()
        && !first.is_empty()
        && !candidate.starts_with(first)
    {
        return false;
    }
    if let Some(last) = segments.last()
        && !last.is_empty()
        && !candidate.ends_with(last)
    {
        return false;
    }

    let mut rest = candidate;
    for segment in segments.iter().filter(|s| !s.is_empty()) {
        match rest.find(segment) {
            Some(index) => rest = &rest[index + segment.len()..],
            None => return false,
        }
    }
    true
}

/// glob 패턴을 앵커된 정규식으로 컴파일합니다.
fn compile_glob(pattern: &str) -> Result<Regex, String> {
    let body = glob_to_regex(pattern)?;
    Regex::new(&format!("(?s)^{body}$")).map_err(|e| e.to_string())
}

fn glob_to_regex(pattern: &str) -> Result<String, String> {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| "trailing backslash".to_owned())?;
                push_literal(&mut out, escaped);
            }
            '[' => translate_class(&mut chars, &mut out)?,
            other => push_literal(&mut out, other),
        }
    }

    Ok(out)
}

/// `[` 다음부터 `]`까지의 문자 클래스를 변환합니다.
fn translate_class(chars: &mut std::str::Chars<'_>, out: &mut String) -> Result<(), String> {
    let mut class = String::new();
    let mut negated = false;
    let mut items = 0usize;
    let mut first = true;

    loop {
        let c = chars
            .next()
            .ok_or_else(|| "unterminated character class".to_owned())?;

        if first && c == '^' {
            negated = true;
            first = false;
            continue;
        }
        first = false;

        let lo = match c {
            ']' => break,
            '\\' => chars
                .next()
                .ok_or_else(|| "unterminated character class".to_owned())?,
            other => other,
        };

        // 범위 검사: `-` 다음 문자가 `]`가 아니면 범위
        let mut lookahead = chars.clone();
        if lookahead.next() == Some('-') {
            match lookahead.next() {
                Some(']') | None => {}
                Some(hi) => {
                    let hi = if hi == '\\' {
                        lookahead
                            .next()
                            .ok_or_else(|| "unterminated character class".to_owned())?
                    } else {
                        hi
                    };
                    if lo > hi {
                        return Err(format!("invalid range {lo}-{hi} in character class"));
                    }
                    *chars = lookahead;
                    push_literal(&mut class, lo);
                    class.push('-');
                    push_literal(&mut class, hi);
                    items += 1;
                    continue;
                }
            }
        }

        push_literal(&mut class, lo);
        items += 1;
    }

    if items == 0 {
        return Err("empty character class".to_owned());
    }

    out.push('[');
    if negated {
        out.push('^');
    }
    out.push_str(&class);
    out.push(']');
    Ok(())
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(candidate: &str, pattern: &str) -> bool {
        wildcard_match(candidate, pattern)
    }

    #[test]
    fn exact_literal_match() {
        assert!(m("/Users/a/doc.txt", "/Users/a/doc.txt"));
        assert!(!m("/Users/a/doc.txt", "/Users/a/doc.md"));
    }

    #[test]
    fn star_spans_slashes() {
        assert!(m("/Users/a/deep/dir/doc.txt", "/Users/*.txt"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        assert!(m("file1.log", "file?.log"));
        assert!(!m("file12.log", "file?.log"));
    }

    #[test]
    fn character_classes() {
        assert!(m("file3.log", "file[0-9].log"));
        assert!(!m("filex.log", "file[0-9].log"));
        assert!(m("filex.log", "file[^0-9].log"));
        assert!(m("b.txt", "[abc].txt"));
    }

    #[test]
    fn escaped_metacharacters_are_literal() {
        assert!(m("what*.txt", r"what\*.txt"));
        assert!(!m("whatever.txt", r"what\*.txt"));
        assert!(m("a.b", "a.b"));
        assert!(!m("axb", "a.b"));
    }

    #[test]
    fn recursive_descent_form() {
        let pattern = "/Users/**/doc.txt";
        assert!(m("/Users/a/doc.txt", pattern));
        assert!(m("/Users/a/b/c/doc.txt", pattern));
        assert!(!m("/Volumes/a/doc.txt", pattern));
    }

    #[test]
    fn recursive_descent_with_empty_prefix() {
        assert!(m("/a/b/node_modules/x.js", "**/node_modules/*"));
    }

    #[test]
    fn recursive_suffix_glob_is_applied_per_boundary() {
        // "src/*.rs"는 각 경계에서 시도됨
        assert!(m("/home/me/proj/src/lib.rs", "/home/**/src/*.rs"));
    }

    #[test]
    fn prefix_and_suffix_wildcards() {
        assert!(m("/Users/a/notes.md", "*.md"));
        assert!(m("/Users/a/notes.md", "/Users/*"));
        assert!(!m("/Volumes/a/notes.md", "/Users/*"));
    }

    #[test]
    fn multi_wildcard_segments_in_order() {
        assert!(segments_in_order("/Users/a/proj/src/main.rs", "/Users/*proj*.rs"));
        assert!(!segments_in_order("/Users/a/src/proj.txt", "/Users/*src*proj*.rs"));
        // 순서가 뒤바뀌면 실패
        assert!(!segments_in_order("/a/two/one/x", "/a/*one*two*"));
    }

    #[test]
    fn process_name_patterns() {
        assert!(m("Code Helper", "*Code*"));
        assert!(m("Google Chrome", "Google*"));
        assert!(!m("Safari", "*Code*"));
    }

    #[test]
    fn invalid_patterns_match_nothing() {
        for bad in ["[abc", "file[].log", r"trailing\", "[z-a]"] {
            let pattern = WildcardPattern::new_lenient(bad);
            assert!(!pattern.is_valid(), "{bad} should be invalid");
            assert!(!pattern.matches(bad));
            assert!(!pattern.matches("anything"));
        }
    }

    #[test]
    fn strict_constructor_reports_reason() {
        let err = WildcardPattern::new("[abc").unwrap_err();
        assert!(matches!(err, IngestError::Pattern { .. }));
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn dash_at_class_edges_is_literal() {
        assert!(m("a-b", "a[-x]b"));
        assert!(m("a-b", "a[x-]b"));
    }

    #[test]
    fn lone_star_matches_everything() {
        assert!(m("", "*"));
        assert!(m("/any/path", "*"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn matching_is_deterministic(candidate in ".{0,64}", pattern in ".{1,32}") {
                let compiled = WildcardPattern::new_lenient(&pattern);
                let first = compiled.matches(&candidate);
                let second = compiled.matches(&candidate);
                prop_assert_eq!(first, second);
                prop_assert_eq!(first, wildcard_match(&candidate, &pattern));
            }

            #[test]
            fn star_suffix_matches_any_literal_ending(
                head in "[a-zA-Z0-9/_]{0,40}",
                tail in "[a-zA-Z0-9_.]{1,10}",
            ) {
                let candidate = format!("{head}{tail}");
                let pattern = format!("*{tail}");
                prop_assert!(wildcard_match(&candidate, &pattern));
            }

            #[test]
            fn literal_pattern_matches_itself(literal in "[a-zA-Z0-9/_.-]{1,40}") {
                prop_assert!(wildcard_match(&literal, &literal));
            }
        }
    }
}
