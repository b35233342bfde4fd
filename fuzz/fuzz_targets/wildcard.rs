#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use filewatch_ingest::wildcard::WildcardPattern;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    pattern: String,
    candidate: String,
}

fuzz_target!(|input: FuzzInput| {
    // 잘못된 패턴은 에러여야 하고 패닉이면 안 됨
    let Ok(pattern) = WildcardPattern::new(&input.pattern) else {
        let lenient = WildcardPattern::new_lenient(&input.pattern);
        assert!(!lenient.matches(&input.candidate));
        return;
    };

    // 같은 입력에 항상 같은 결과
    let first = pattern.matches(&input.candidate);
    assert_eq!(first, pattern.matches(&input.candidate));

    // 와일드카드 없는 패턴은 자기 자신과 매칭
    if !input.pattern.contains(['*', '?', '[', '\\']) {
        assert!(pattern.matches(&input.pattern));
    }
});
