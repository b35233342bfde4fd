//! Orchestrator tests.
//!
//! Runs a full session against a scripted `sh` producer and the in-memory store,
//! then checks the shutdown summary.

use std::sync::Arc;
use std::time::Duration;

use filewatch_core::config::FilewatchConfig;
use filewatch_daemon::orchestrator::Orchestrator;
use filewatch_ingest::SourceCommand;
use filewatch_store::MemoryStore;

fn scripted_producer(lines: &[&str]) -> SourceCommand {
    let quoted: Vec<String> = lines.iter().map(|l| format!("'{l}'")).collect();
    let script = format!("printf '%s\\n' {}; sleep 30", quoted.join(" "));
    SourceCommand::new("sh", vec!["-c".to_owned(), script])
}

/// Resolves once the store holds `expected` records.
async fn stored(store: Arc<MemoryStore>, expected: usize) -> anyhow::Result<&'static str> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while store.stats().await.current_records < expected {
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("store did not reach {expected} records");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok("test")
}

#[tokio::test]
async fn test_session_summary_reflects_stored_events() {
    // Given: a config that flushes every event and excludes log files
    let mut config = FilewatchConfig::default();
    config.ingest.batch_size = 1;
    config.ingest.exclude_pattern = "*.log".to_owned();

    let producer = scripted_producer(&[
        "12:00:00 write F=3 /Users/a/main.rs Code.10",
        "12:00:00 write F=3 /Users/a/main.rs Code.10",
        "12:00:00 write F=3 /Users/a/notes.log Code.10",
        "12:00:00 read F=4 /Users/a/lib.rs Code.10",
        "12:00:00 open /Users/a/page.html Safari.20",
    ]);
    let mut orchestrator =
        Orchestrator::build_with_source(config, Some(producer)).expect("should build");
    let store = orchestrator.store();

    // When: the session runs until all kept events are stored
    let summary = orchestrator
        .run_until(stored(Arc::clone(&store), 3))
        .await
        .expect("session should run");

    // Then: duplicates and excluded paths never reach the store
    assert_eq!(summary.store.current_records, 3);
    assert_eq!(summary.pipeline.lines_read, 5);
    assert_eq!(summary.pipeline.events_suppressed, 1);
    assert_eq!(summary.pipeline.events_filtered, 1);
    assert_eq!(summary.session.filters.exclude.as_deref(), Some("*.log"));

    let top: Vec<(String, u64)> = summary
        .top_processes
        .iter()
        .map(|p| (p.process_name.clone(), p.count))
        .collect();
    assert_eq!(
        top,
        vec![("Code".to_owned(), 2), ("Safari".to_owned(), 1)]
    );

    // And: the summary serializes with the session id as a string
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["session"]["id"], summary.session.id.to_string());
    assert_eq!(json["store"]["current_records"], 3);

    // And: the session is stopped
    assert_eq!(orchestrator.coordinator().state_name(), "idle");
    assert_eq!(store.recent(1).await[0].event.process_name, "Safari");
}

#[tokio::test]
async fn test_final_flush_happens_on_shutdown() {
    // Given: batches that never fill and a long flush interval
    let mut config = FilewatchConfig::default();
    config.ingest.batch_size = 1000;
    config.ingest.flush_interval_secs = 3600;

    let producer = scripted_producer(&["12:00:00 write F=3 /Users/a/doc.txt myapp.123"]);
    let mut orchestrator = Orchestrator::build_with_source(config, Some(producer)).unwrap();

    // When: shutdown arrives once the line has been read
    let summary = orchestrator
        .run_until(async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok::<_, anyhow::Error>("test")
        })
        .await
        .unwrap();

    // Then: the pending event was flushed by stop
    assert_eq!(summary.pipeline.batches_flushed, 1);
    assert_eq!(summary.store.current_records, 1);
    let record = &orchestrator.store().recent(1).await[0];
    assert_eq!(record.id, 1);
    assert_eq!(record.event.file_path, "/Users/a/doc.txt");
}

#[tokio::test]
async fn test_failed_signal_still_stops_session() {
    let producer = scripted_producer(&[]);
    let mut orchestrator =
        Orchestrator::build_with_source(FilewatchConfig::default(), Some(producer)).unwrap();

    let result = orchestrator
        .run_until(async { Err::<&'static str, _>(anyhow::anyhow!("no signal handler")) })
        .await;

    assert!(result.is_err());
    assert_eq!(orchestrator.coordinator().state_name(), "idle");
}

#[tokio::test]
async fn test_producer_spawn_failure_is_reported() {
    let producer = SourceCommand::new("/nonexistent/filewatch-producer", Vec::new());
    let mut orchestrator =
        Orchestrator::build_with_source(FilewatchConfig::default(), Some(producer)).unwrap();

    let err = orchestrator
        .run_until(async { Ok::<_, anyhow::Error>("test") })
        .await
        .unwrap_err();

    assert!(err.to_string().contains("failed to start monitoring session"));
    assert_eq!(orchestrator.coordinator().state_name(), "idle");
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = FilewatchConfig::default();
    config.store.max_records = 0;

    let result = Orchestrator::build_from_config(config);
    assert!(result.is_err());
}

#[tokio::test]
async fn test_store_capacity_follows_config() {
    let mut config = FilewatchConfig::default();
    config.store.max_records = 42;

    let orchestrator = Orchestrator::build_from_config(config).unwrap();
    assert_eq!(orchestrator.store().stats().await.max_records, 42);
    assert_eq!(orchestrator.config().store.max_records, 42);
    assert_eq!(orchestrator.coordinator().state_name(), "idle");
}
