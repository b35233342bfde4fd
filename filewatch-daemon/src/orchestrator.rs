//! Session orchestration -- configuration, assembly, and lifecycle management.
//!
//! The [`Orchestrator`] wires the ingest [`Coordinator`] to a [`MemoryStore`],
//! starts one monitoring session, waits for a shutdown signal, stops the
//! session (which performs the final flush), and reports a summary.
//!
//! # Shutdown Order
//!
//! 1. Signal received (SIGTERM or SIGINT)
//! 2. Coordinator stop: producer killed, tasks drained, remaining events flushed
//! 3. Summary read from the store

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use filewatch_core::config::FilewatchConfig;
use filewatch_core::error::{ConfigError, FilewatchError};
use filewatch_core::pipeline::HealthStatus;
use filewatch_ingest::{
    Coordinator, CoordinatorBuilder, PipelineConfig, PipelineStats, SessionInfo, SourceCommand,
};
use filewatch_store::{MemoryStore, ProcessAccessCount, StoreStats};

use crate::cli::DEFAULT_CONFIG_PATH;

/// How often the running session's health is checked.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Number of processes listed in the exit summary.
const TOP_PROCESSES: usize = 10;

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Loaded from this file.
    File(PathBuf),
    /// Default path was absent; built-in defaults (plus env overrides) are used.
    Defaults(PathBuf),
}

/// Load configuration for the daemon.
///
/// An explicitly given path must exist. When no path is given, a missing
/// `filewatch.toml` falls back to built-in defaults with environment
/// overrides applied.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub async fn load_config(explicit: Option<&Path>) -> Result<(FilewatchConfig, ConfigOrigin)> {
    if let Some(path) = explicit {
        let config = FilewatchConfig::load(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        return Ok((config, ConfigOrigin::File(path.to_path_buf())));
    }

    let path = PathBuf::from(DEFAULT_CONFIG_PATH);
    match FilewatchConfig::load(&path).await {
        Ok(config) => Ok((config, ConfigOrigin::File(path))),
        Err(FilewatchError::Config(ConfigError::FileNotFound { .. })) => {
            let mut config = FilewatchConfig::default();
            config.apply_env_overrides();
            config
                .validate()
                .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
            Ok((config, ConfigOrigin::Defaults(path)))
        }
        Err(e) => Err(anyhow::anyhow!("failed to load config: {}", e)),
    }
}

/// What a finished session leaves behind.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// Session that ran.
    pub session: SessionInfo,
    /// Ingest counters at stop time.
    pub pipeline: PipelineStats,
    /// Store occupancy at stop time.
    pub store: StoreStats,
    /// Processes with the most stored accesses.
    pub top_processes: Vec<ProcessAccessCount>,
}

/// The daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: FilewatchConfig,
    /// Event store shared with the coordinator.
    store: Arc<MemoryStore>,
    /// Session state machine.
    coordinator: Coordinator<MemoryStore>,
}

impl Orchestrator {
    /// Build from an already-loaded configuration.
    pub fn build_from_config(config: FilewatchConfig) -> Result<Self> {
        Self::build_with_source(config, None)
    }

    /// Build with an explicit producer command instead of the configured one.
    ///
    /// Useful for testing with a scripted producer.
    pub fn build_with_source(
        config: FilewatchConfig,
        source: Option<SourceCommand>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        let store = Arc::new(MemoryStore::from_config(&config.store));
        let pipeline_config = PipelineConfig::from_core(&config.ingest);

        let mut builder = CoordinatorBuilder::new()
            .config(pipeline_config)
            .sink(Arc::clone(&store));
        if let Some(source) = source {
            builder = builder.source(source);
        }
        let coordinator = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build coordinator: {}", e))?;

        tracing::info!(
            max_records = config.store.max_records,
            batch_size = config.ingest.batch_size,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            store,
            coordinator,
        })
    }

    /// Start a session and run until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<SessionSummary> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Start a session and run until `shutdown` resolves.
    ///
    /// The session uses the configured default filters. The session is stopped
    /// (and its final batch flushed) before the summary is collected.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<SessionSummary>
    where
        F: Future<Output = Result<&'static str>>,
    {
        let patterns = self.coordinator.config().default_filters.clone();
        let session = self
            .coordinator
            .start(patterns)
            .await
            .map_err(|e| anyhow::anyhow!("failed to start monitoring session: {}", e))?;

        tracing::info!(session = %session.id, "entering main loop");

        let mut health_ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + HEALTH_CHECK_INTERVAL,
            HEALTH_CHECK_INTERVAL,
        );
        tokio::pin!(shutdown);

        let signal = loop {
            tokio::select! {
                signal = &mut shutdown => break signal,
                _ = health_ticker.tick() => self.log_health(),
            }
        };

        match &signal {
            Ok(name) => tracing::info!(signal = name, "shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "shutdown signal handling failed"),
        }

        // 시그널 처리 실패여도 세션은 정지
        self.coordinator
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("failed to stop monitoring session: {}", e))?;
        signal?;

        let summary = SessionSummary {
            session,
            pipeline: self.coordinator.stats(),
            store: self.store.stats().await,
            top_processes: self
                .store
                .count_by_process()
                .await
                .into_iter()
                .take(TOP_PROCESSES)
                .collect(),
        };
        log_summary(&summary);
        Ok(summary)
    }

    fn log_health(&self) {
        match self.coordinator.health_check() {
            HealthStatus::Healthy => tracing::debug!("monitoring session healthy"),
            HealthStatus::Degraded(reason) => {
                tracing::warn!(reason = %reason, "monitoring session degraded")
            }
            HealthStatus::Unhealthy(reason) => {
                tracing::error!(reason = %reason, "monitoring session unhealthy")
            }
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &FilewatchConfig {
        &self.config
    }

    /// Get the event store.
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }

    /// Get the session coordinator.
    pub fn coordinator(&self) -> &Coordinator<MemoryStore> {
        &self.coordinator
    }
}

fn log_summary(summary: &SessionSummary) {
    tracing::info!(
        session = %summary.session.id,
        lines_read = summary.pipeline.lines_read,
        events_flushed = summary.pipeline.events_flushed,
        events_suppressed = summary.pipeline.events_suppressed,
        events_dropped = summary.pipeline.events_dropped,
        stored = summary.store.current_records,
        max_records = summary.store.max_records,
        "session summary"
    );
    for (rank, entry) in summary.top_processes.iter().enumerate() {
        tracing::info!(
            rank = rank + 1,
            process = %entry.process_name,
            count = entry.count,
            "top process"
        );
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
