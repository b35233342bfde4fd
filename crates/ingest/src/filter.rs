//! 필터 엔진 -- 파싱된 이벤트를 보존할지 결정합니다.
//!
//! 세션 시작 시 [`FilterPatterns`]를 [`FilterSet`]으로 한 번 컴파일하고,
//! 세션이 끝날 때까지 변경하지 않습니다. 평가 순서 (단락 평가):
//!
//! 1. 프로세스 패턴 (설정된 경우 프로세스 이름이 매칭되어야 함)
//! 2. 포함 패턴 (설정된 경우 경로가 매칭되어야 함)
//! 3. 제외 패턴 (설정되어 있고 경로가 매칭되면 버림)
//! 4. 정적 무시 접두사 목록
//! 5. 정적 무시 접미사 목록

use serde::{Deserialize, Serialize};

use filewatch_core::types::AccessEvent;

use crate::wildcard::WildcardPattern;

/// 항상 버리는 경로 접두사 (디바이스, 시스템 캐시/로그, 임시 디렉토리 등)
pub const IGNORED_PREFIXES: &[&str] = &[
    "/dev/",
    "/usr/share/",
    "/private/var/folders/",
    "/System/Library/",
    "/Library/Caches/",
    "/Library/Logs/",
    "/var/log/",
    "/var/db/",
    "/private/tmp/",
    "/tmp/",
    "/Library/Apple/",
    "/Library/PrivilegedHelperTools/",
    "/Applications/Xcode.app/Contents/",
];

/// 항상 버리는 경로 접미사 (임시/캐시/스왑 파일, OS 메타데이터, VCS 내부)
pub const IGNORED_SUFFIXES: &[&str] = &[
    ".tmp",
    ".temp",
    ".cache",
    ".swap",
    ".swp",
    ".DS_Store",
    ".localized",
    ".git",
];

/// 세션 필터 패턴 (원본 문자열)
///
/// 빈 문자열은 "설정 안 됨"으로 정규화됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPatterns {
    /// 포함 경로 패턴
    pub include: Option<String>,
    /// 제외 경로 패턴
    pub exclude: Option<String>,
    /// 프로세스 이름 패턴
    pub process: Option<String>,
}

impl FilterPatterns {
    /// 패턴 세 개로 생성합니다. 빈 문자열은 `None`이 됩니다.
    pub fn new(
        include: impl Into<String>,
        exclude: impl Into<String>,
        process: impl Into<String>,
    ) -> Self {
        Self {
            include: Some(include.into()),
            exclude: Some(exclude.into()),
            process: Some(process.into()),
        }
        .normalized()
    }

    /// 빈 문자열 패턴을 `None`으로 바꿉니다.
    pub fn normalized(self) -> Self {
        fn clean(pattern: Option<String>) -> Option<String> {
            pattern.filter(|p| !p.is_empty())
        }
        Self {
            include: clean(self.include),
            exclude: clean(self.exclude),
            process: clean(self.process),
        }
    }

    /// 설정된 패턴이 하나도 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.include.is_none() && self.exclude.is_none() && self.process.is_none()
    }
}

/// 컴파일된 세션 필터 (불변 스냅샷)
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    patterns: FilterPatterns,
    include: Option<WildcardPattern>,
    exclude: Option<WildcardPattern>,
    process: Option<WildcardPattern>,
}

impl FilterSet {
    /// 패턴을 컴파일합니다.
    ///
    /// 잘못된 패턴은 경고 로그를 남기고 "매칭 없음"으로 취급됩니다.
    /// 따라서 잘못된 포함/프로세스 패턴은 모든 이벤트를 버리고,
    /// 잘못된 제외 패턴은 아무것도 제외하지 않습니다.
    pub fn compile(patterns: FilterPatterns) -> Self {
        let patterns = patterns.normalized();
        let compile = |p: &Option<String>| p.as_deref().map(WildcardPattern::new_lenient);

        Self {
            include: compile(&patterns.include),
            exclude: compile(&patterns.exclude),
            process: compile(&patterns.process),
            patterns,
        }
    }

    /// 컴파일 전 원본 패턴
    pub fn patterns(&self) -> &FilterPatterns {
        &self.patterns
    }

    /// 이벤트를 보존해야 하는지 판단합니다.
    pub fn should_keep(&self, event: &AccessEvent) -> bool {
        if let Some(process) = &self.process
            && !process.matches(&event.process_name)
        {
            return false;
        }

        if let Some(include) = &self.include
            && !include.matches(&event.file_path)
        {
            return false;
        }

        if let Some(exclude) = &self.exclude
            && exclude.matches(&event.file_path)
        {
            return false;
        }

        !is_ignored_path(&event.file_path)
    }
}

/// 정적 무시 목록에 해당하는 경로인지 확인합니다.
pub fn is_ignored_path(path: &str) -> bool {
    IGNORED_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
        || IGNORED_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use filewatch_core::types::Operation;

    fn event(process: &str, path: &str) -> AccessEvent {
        AccessEvent {
            timestamp: Utc::now(),
            process_name: process.to_owned(),
            pid: 1,
            file_path: path.to_owned(),
            operation: Operation::Read,
        }
    }

    #[test]
    fn no_patterns_keeps_everything_not_ignored() {
        let filters = FilterSet::default();
        assert!(filters.should_keep(&event("myapp", "/Users/a/doc.txt")));
        assert!(!filters.should_keep(&event("myapp", "/dev/null")));
        assert!(!filters.should_keep(&event("myapp", "/Users/a/.DS_Store")));
    }

    #[test]
    fn empty_strings_normalize_to_unset() {
        let patterns = FilterPatterns::new("", "", "");
        assert!(patterns.is_empty());
        assert_eq!(patterns, FilterPatterns::default());
    }

    #[test]
    fn process_filter_applies_first() {
        let filters = FilterSet::compile(FilterPatterns::new("", "", "*Code*"));
        assert!(filters.should_keep(&event("Code Helper", "/Users/a/main.rs")));
        assert!(!filters.should_keep(&event("Safari", "/Users/a/main.rs")));
    }

    #[test]
    fn include_filter_requires_match() {
        let filters = FilterSet::compile(FilterPatterns::new("/Users/**/*.txt", "", ""));
        assert!(filters.should_keep(&event("a", "/Users/a/b/doc.txt")));
        assert!(!filters.should_keep(&event("a", "/Users/a/b/doc.md")));
    }

    #[test]
    fn exclude_wins_over_include() {
        let filters = FilterSet::compile(FilterPatterns::new("/Users/*", "*.txt", ""));
        assert!(!filters.should_keep(&event("a", "/Users/a/doc.txt")));
        assert!(filters.should_keep(&event("a", "/Users/a/doc.md")));
    }

    #[test]
    fn static_lists_apply_even_when_included() {
        let filters = FilterSet::compile(FilterPatterns::new("*", "", ""));
        assert!(!filters.should_keep(&event("a", "/tmp/scratch")));
        assert!(!filters.should_keep(&event("a", "/Users/a/.vimrc.swp")));
        assert!(!filters.should_keep(&event("a", "/Applications/Xcode.app/Contents/x")));
    }

    #[test]
    fn invalid_include_pattern_drops_everything() {
        let filters = FilterSet::compile(FilterPatterns::new("[oops", "", ""));
        assert!(!filters.should_keep(&event("a", "/Users/a/doc.txt")));
    }

    #[test]
    fn invalid_exclude_pattern_excludes_nothing() {
        let filters = FilterSet::compile(FilterPatterns::new("", "[oops", ""));
        assert!(filters.should_keep(&event("a", "/Users/a/doc.txt")));
    }

    #[test]
    fn patterns_are_preserved_for_reporting() {
        let filters = FilterSet::compile(FilterPatterns::new("/Users/*", "", "*Code*"));
        assert_eq!(filters.patterns().include.as_deref(), Some("/Users/*"));
        assert_eq!(filters.patterns().exclude, None);
        assert_eq!(filters.patterns().process.as_deref(), Some("*Code*"));
    }

    #[test]
    fn ignored_path_lists() {
        assert!(is_ignored_path("/private/var/folders/xy/T/file"));
        assert!(is_ignored_path("/Users/a/repo/.git"));
        assert!(is_ignored_path("/Users/a/data.cache"));
        assert!(!is_ignored_path("/Users/a/repo/.gitignore"));
        assert!(!is_ignored_path("/Library/Preferences/x.plist"));
    }
}
