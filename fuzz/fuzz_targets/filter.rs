#![no_main]

use arbitrary::Arbitrary;
use chrono::Utc;
use libfuzzer_sys::fuzz_target;

use filewatch_core::types::{AccessEvent, Operation};
use filewatch_ingest::filter::{FilterPatterns, FilterSet, is_ignored_path};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    include: String,
    exclude: String,
    process: String,
    process_name: String,
    file_path: String,
}

fuzz_target!(|input: FuzzInput| {
    let filters = FilterSet::compile(FilterPatterns::new(
        input.include,
        input.exclude,
        input.process,
    ));

    let event = AccessEvent {
        timestamp: Utc::now(),
        process_name: input.process_name,
        pid: 1,
        file_path: input.file_path,
        operation: Operation::Write,
    };

    // 정적 무시 목록은 어떤 패턴으로도 통과시킬 수 없음
    if filters.should_keep(&event) {
        assert!(!is_ignored_path(&event.file_path));
    }
});
