//! 메트릭 상수
//!
//! 모든 메트릭의 이름을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다. 익스포터 설치는 임베딩 애플리케이션의 몫입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `filewatch_`
//! - 모듈명: `ingest_`, `store_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(filewatch_core::metrics::INGEST_LINES_READ_TOTAL).increment(1);
//! ```

// ─── Ingest 메트릭 ──────────────────────────────────────────────────

/// Ingest: 프로듀서에서 읽은 라인 수 (counter)
pub const INGEST_LINES_READ_TOTAL: &str = "filewatch_ingest_lines_read_total";

/// Ingest: 이벤트로 파싱된 라인 수 (counter)
pub const INGEST_EVENTS_PARSED_TOTAL: &str = "filewatch_ingest_events_parsed_total";

/// Ingest: 필터에 의해 버려진 이벤트 수 (counter)
pub const INGEST_EVENTS_FILTERED_TOTAL: &str = "filewatch_ingest_events_filtered_total";

/// Ingest: 디바운스로 억제된 이벤트 수 (counter)
pub const INGEST_EVENTS_SUPPRESSED_TOTAL: &str = "filewatch_ingest_events_suppressed_total";

/// Ingest: 내부 채널 포화로 드롭된 이벤트 수 (counter)
pub const INGEST_EVENTS_DROPPED_TOTAL: &str = "filewatch_ingest_events_dropped_total";

/// Ingest: 저장소로 플러시된 배치 수 (counter)
pub const INGEST_BATCHES_FLUSHED_TOTAL: &str = "filewatch_ingest_batches_flushed_total";

/// Ingest: 저장소 쓰기 실패 수 (counter)
pub const INGEST_SINK_FAILURES_TOTAL: &str = "filewatch_ingest_sink_failures_total";

/// Ingest: 중복 제거 캐시 엔트리 수 (gauge)
pub const INGEST_DEDUP_CACHE_SIZE: &str = "filewatch_ingest_dedup_cache_size";

// ─── Store 메트릭 ───────────────────────────────────────────────────

/// Store: 보관 중인 레코드 수 (gauge)
pub const STORE_RECORDS: &str = "filewatch_store_records";
