#![no_main]

use filewatch_ingest::parser::{LineParser, ParserConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);

    // 크래시나 패닉 없이 Some 또는 None을 반환해야 한다
    for track_unlink in [false, true] {
        let parser = LineParser::with_config(ParserConfig {
            track_unlink,
            ..Default::default()
        });
        if let Some(event) = parser.parse(&line) {
            assert!(!event.file_path.is_empty());
            assert!(event.file_path.starts_with('/'));
            assert!(line.contains('/'));
        }
    }
});
