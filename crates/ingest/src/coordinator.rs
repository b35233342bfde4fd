//! 수집 코디네이터 -- 모니터링 세션의 생명주기를 관리합니다.
//!
//! [`Coordinator`]는 `Idle -> Running -> Stopping -> Idle` 상태 머신입니다.
//! 한 번에 하나의 세션만 존재하며, 세션마다 프로듀서 프로세스 하나와
//! 백그라운드 태스크 세 개를 소유합니다.
//!
//! # 내부 아키텍처
//! ```text
//!                 ┌─────────── reader task ───────────┐
//! producer stdout ─▶ LineParser ─▶ FilterSet ─▶ DedupCache ─▶ mpsc ─▶ flush task ─▶ EventSink
//!                                                  ▲                   (BatchBuffer)
//!                                   cleanup task ──┘
//! ```
//!
//! - reader: 라인을 읽어 파싱/필터/중복 제거 후 채널로 보냅니다. 채널이 가득 차면
//!   이벤트를 버리고 카운트합니다 (리더는 느린 저장소 때문에 막히지 않음).
//! - flush: 배치 버퍼의 유일한 소유자. 임계값 도달 시 즉시, 타이머 틱마다 주기적으로
//!   플러시합니다. 채널이 닫히면 남은 이벤트를 모두 받고 최종 플러시 후 종료합니다.
//! - cleanup: 주기적으로 중복 제거 캐시의 오래된 키를 제거합니다.
//!
//! 정지 시 취소 토큰을 브로드캐스트하고 프로듀서를 강제 종료합니다. 리더가 종료하며
//! 송신측을 드롭하면 채널이 닫히고, 플러시 태스크가 최종 플러시를 수행합니다.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use filewatch_core::metrics as m;
use filewatch_core::pipeline::HealthStatus;
use filewatch_core::sink::EventSink;
use filewatch_core::types::AccessEvent;

use crate::buffer::BatchBuffer;
use crate::config::PipelineConfig;
use crate::dedup::DedupCache;
use crate::error::IngestError;
use crate::filter::{FilterPatterns, FilterSet};
use crate::parser::LineParser;
use crate::source::{LineReader, SourceCommand, SpawnedSource};

/// 채널 포화 경고를 남기는 드롭 간격
const DROP_WARN_EVERY: u64 = 1000;

/// 세션 카운터 (태스크 간 공유)
#[derive(Debug, Default)]
struct SessionCounters {
    lines_read: AtomicU64,
    events_parsed: AtomicU64,
    events_filtered: AtomicU64,
    events_suppressed: AtomicU64,
    events_dropped: AtomicU64,
    events_forwarded: AtomicU64,
    batches_flushed: AtomicU64,
    events_flushed: AtomicU64,
    sink_failures: AtomicU64,
    dedup_evicted: AtomicU64,
    /// 취소 전에 프로듀서 출력이 끝났는지 여부
    producer_exited: AtomicBool,
}

impl SessionCounters {
    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            events_parsed: self.events_parsed.load(Ordering::Relaxed),
            events_filtered: self.events_filtered.load(Ordering::Relaxed),
            events_suppressed: self.events_suppressed.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            events_forwarded: self.events_forwarded.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            events_flushed: self.events_flushed.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            dedup_evicted: self.dedup_evicted.load(Ordering::Relaxed),
        }
    }
}

/// 세션 통계 스냅샷
///
/// 세션이 정지된 뒤에도 다음 세션이 시작될 때까지 마지막 값이 유지됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// 프로듀서에서 읽은 라인 수
    pub lines_read: u64,
    /// 이벤트로 파싱된 라인 수
    pub events_parsed: u64,
    /// 필터에 의해 버려진 이벤트 수
    pub events_filtered: u64,
    /// 디바운스로 억제된 이벤트 수
    pub events_suppressed: u64,
    /// 채널 포화로 드롭된 이벤트 수
    pub events_dropped: u64,
    /// 배치 버퍼로 전달된 이벤트 수
    pub events_forwarded: u64,
    /// 저장소에 기록된 배치 수
    pub batches_flushed: u64,
    /// 저장소에 기록된 이벤트 수
    pub events_flushed: u64,
    /// 실패한 저장소 쓰기 수
    pub sink_failures: u64,
    /// 정리 태스크가 중복 제거 캐시에서 제거한 키 수
    pub dedup_evicted: u64,
}

/// 시작된 세션 정보
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    /// 세션 ID
    pub id: Uuid,
    /// 시작 시각
    pub started_at: DateTime<Utc>,
    /// 세션 필터 패턴
    pub filters: FilterPatterns,
    /// 실행된 프로듀서 명령줄
    pub command: String,
}

/// 활성 모니터링 세션
///
/// 시작 시 생성되고 정지 시 파괴됩니다. 드롭되면 태스크를 취소하고
/// 프로듀서는 `kill_on_drop`으로 종료됩니다.
struct Session {
    info: SessionInfo,
    filters: Arc<FilterSet>,
    cancel: CancellationToken,
    child: Child,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// 코디네이터 상태
enum CoordinatorState {
    /// 세션 없음
    Idle,
    /// 세션 실행 중
    Running(Session),
    /// 정지 진행 중
    Stopping,
}

/// 수집 코디네이터
///
/// # 사용 예시
/// ```ignore
/// use filewatch_ingest::{CoordinatorBuilder, FilterPatterns};
///
/// let mut coordinator = CoordinatorBuilder::new()
///     .config(config)
///     .sink(Arc::new(store))
///     .build()?;
///
/// coordinator.start(FilterPatterns::new("/Users/**", "", "")).await?;
/// // ...
/// coordinator.stop().await?;
/// ```
pub struct Coordinator<S: EventSink + 'static> {
    config: PipelineConfig,
    source: SourceCommand,
    sink: Arc<S>,
    state: CoordinatorState,
    counters: Arc<SessionCounters>,
}

impl<S: EventSink + 'static> Coordinator<S> {
    /// 현재 상태명을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            CoordinatorState::Idle => "idle",
            CoordinatorState::Running(_) => "running",
            CoordinatorState::Stopping => "stopping",
        }
    }

    /// 세션이 실행 중인지 여부
    pub fn is_running(&self) -> bool {
        matches!(self.state, CoordinatorState::Running(_))
    }

    /// 실행 중인 세션 ID
    pub fn session_id(&self) -> Option<Uuid> {
        self.session().map(|s| s.info.id)
    }

    /// 실행 중인 세션 정보
    pub fn session_info(&self) -> Option<&SessionInfo> {
        self.session().map(|s| &s.info)
    }

    /// 현재 세션의 필터 패턴. 세션이 없으면 빈 패턴입니다.
    pub fn current_filters(&self) -> FilterPatterns {
        self.session()
            .map(|s| s.filters.patterns().clone())
            .unwrap_or_default()
    }

    /// 현재(또는 마지막) 세션의 통계
    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 저장소에 대한 Arc 참조를 반환합니다.
    pub fn sink(&self) -> Arc<S> {
        Arc::clone(&self.sink)
    }

    fn session(&self) -> Option<&Session> {
        match &self.state {
            CoordinatorState::Running(session) => Some(session),
            _ => None,
        }
    }

    /// 모니터링 세션을 시작합니다.
    ///
    /// 이미 실행 중이면 [`IngestError::AlreadyRunning`]을 반환하며 상태는 바뀌지 않습니다.
    /// 프로듀서 실행에 실패하면 에러를 반환하고 `Idle`에 머뭅니다.
    pub async fn start(&mut self, patterns: FilterPatterns) -> Result<SessionInfo, IngestError> {
        if self.is_running() {
            warn!("start requested while a monitoring session is running");
            return Err(IngestError::AlreadyRunning);
        }

        let filters = Arc::new(FilterSet::compile(patterns));

        let SpawnedSource { child, lines } = match self.source.spawn(self.config.max_line_length) {
            Ok(spawned) => spawned,
            Err(e) => {
                error!(error = %e, "failed to start trace producer");
                self.state = CoordinatorState::Idle;
                return Err(e);
            }
        };

        let info = SessionInfo {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            filters: filters.patterns().clone(),
            command: self.source.command_line(),
        };

        let counters = Arc::new(SessionCounters::default());
        let cancel = CancellationToken::new();
        let dedup = Arc::new(Mutex::new(DedupCache::new(
            self.config.debounce(),
            self.config.dedup_retention(),
        )));
        let (event_tx, event_rx) = mpsc::channel(self.config.channel_capacity);

        let reader = ReaderTask {
            parser: LineParser::with_config(self.config.parser_config()),
            filters: Arc::clone(&filters),
            dedup: Arc::clone(&dedup),
            event_tx,
            counters: Arc::clone(&counters),
            cancel: cancel.clone(),
        };
        let flusher = FlushTask {
            buffer: BatchBuffer::new(self.config.batch_size),
            event_rx,
            sink: Arc::clone(&self.sink),
            interval: self.config.flush_interval(),
            counters: Arc::clone(&counters),
            session_id: info.id,
        };
        let cleaner = CleanupTask {
            dedup,
            interval: self.config.dedup_cleanup_interval(),
            counters: Arc::clone(&counters),
            cancel: cancel.clone(),
        };

        let tasks = vec![
            ("reader", tokio::spawn(reader.run(lines))),
            ("cleanup", tokio::spawn(cleaner.run())),
            ("flush", tokio::spawn(flusher.run())),
        ];

        info!(
            session = %info.id,
            command = %info.command,
            include = info.filters.include.as_deref().unwrap_or(""),
            exclude = info.filters.exclude.as_deref().unwrap_or(""),
            process = info.filters.process.as_deref().unwrap_or(""),
            track_unlink = self.config.track_unlink,
            "monitoring session started"
        );

        self.counters = counters;
        self.state = CoordinatorState::Running(Session {
            info: info.clone(),
            filters,
            cancel,
            child,
            tasks,
        });
        Ok(info)
    }

    /// 모니터링 세션을 정지합니다.
    ///
    /// 실행 중이 아니면 [`IngestError::NotRunning`]을 반환합니다.
    /// 반환 시점에는 모든 태스크가 종료되었고 최종 플러시가 끝난 상태입니다.
    pub async fn stop(&mut self) -> Result<(), IngestError> {
        let mut session = match std::mem::replace(&mut self.state, CoordinatorState::Stopping) {
            CoordinatorState::Running(session) => session,
            other => {
                self.state = other;
                return Err(IngestError::NotRunning);
            }
        };

        info!(session = %session.info.id, "stopping monitoring session");

        // 1. 취소 브로드캐스트
        session.cancel.cancel();

        // 2. 프로듀서 강제 종료 (이미 종료된 경우 무시)
        if let Err(e) = session.child.start_kill() {
            debug!(error = %e, "trace producer already exited");
        }

        // 3. 태스크 종료 대기 (flush 태스크는 채널이 닫힌 뒤 최종 플러시 수행)
        for (name, task) in session.tasks.drain(..) {
            if let Err(e) = task.await {
                error!(task = name, error = %e, "background task terminated abnormally");
            }
        }

        // 4. 프로세스 회수
        match session.child.wait().await {
            Ok(status) => debug!(%status, "trace producer reaped"),
            Err(e) => warn!(error = %e, "failed to reap trace producer"),
        }

        let stats = self.counters.snapshot();
        info!(
            session = %session.info.id,
            lines_read = stats.lines_read,
            events_flushed = stats.events_flushed,
            events_suppressed = stats.events_suppressed,
            events_dropped = stats.events_dropped,
            sink_failures = stats.sink_failures,
            "monitoring session stopped"
        );

        drop(session);
        self.state = CoordinatorState::Idle;
        Ok(())
    }

    /// 파이프라인 상태를 확인합니다.
    pub fn health_check(&self) -> HealthStatus {
        if !self.is_running() {
            return HealthStatus::Unhealthy("not running".to_owned());
        }

        if self.counters.producer_exited.load(Ordering::Relaxed) {
            return HealthStatus::Degraded("trace producer exited".to_owned());
        }

        let failures = self.counters.sink_failures.load(Ordering::Relaxed);
        if failures > 0 {
            return HealthStatus::Degraded(format!("{failures} sink writes failed"));
        }

        HealthStatus::Healthy
    }
}

/// 코디네이터 빌더
pub struct CoordinatorBuilder<S: EventSink + 'static> {
    config: PipelineConfig,
    sink: Option<Arc<S>>,
    source: Option<SourceCommand>,
}

impl<S: EventSink + 'static> CoordinatorBuilder<S> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            sink: None,
            source: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 배치를 받을 저장소를 지정합니다.
    pub fn sink(mut self, sink: Arc<S>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 설정의 프로듀서 명령 대신 사용할 명령을 지정합니다.
    pub fn source(mut self, source: SourceCommand) -> Self {
        self.source = Some(source);
        self
    }

    /// 코디네이터를 빌드합니다.
    pub fn build(self) -> Result<Coordinator<S>, IngestError> {
        self.config.validate()?;

        let sink = self.sink.ok_or_else(|| IngestError::Config {
            field: "sink".to_owned(),
            reason: "an event sink is required".to_owned(),
        })?;
        let source = self
            .source
            .unwrap_or_else(|| self.config.source_command());

        Ok(Coordinator {
            config: self.config,
            source,
            sink,
            state: CoordinatorState::Idle,
            counters: Arc::new(SessionCounters::default()),
        })
    }
}

impl<S: EventSink + 'static> Default for CoordinatorBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_cache(cache: &Mutex<DedupCache>) -> MutexGuard<'_, DedupCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 라인 소비 태스크
struct ReaderTask {
    parser: LineParser,
    filters: Arc<FilterSet>,
    dedup: Arc<Mutex<DedupCache>>,
    event_tx: mpsc::Sender<AccessEvent>,
    counters: Arc<SessionCounters>,
    cancel: CancellationToken,
}

impl ReaderTask {
    async fn run<R: AsyncRead + Unpin>(self, mut lines: LineReader<R>) {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = lines.next_line() => next,
            };

            match next {
                Ok(Some(line)) => {
                    if !self.process_line(&line) {
                        debug!("event channel closed, reader exiting");
                        break;
                    }
                }
                Ok(None) => {
                    warn!("trace producer closed its output");
                    self.mark_producer_exited();
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "failed to read trace producer output");
                    self.mark_producer_exited();
                    break;
                }
            }
        }
        // event_tx 드롭 -> 플러시 태스크가 드레인 후 종료
    }

    fn mark_producer_exited(&self) {
        if !self.cancel.is_cancelled() {
            self.counters.producer_exited.store(true, Ordering::Relaxed);
        }
    }

    /// 라인 하나를 처리합니다. 채널이 닫혔으면 `false`를 반환합니다.
    fn process_line(&self, line: &str) -> bool {
        self.counters.lines_read.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::INGEST_LINES_READ_TOTAL).increment(1);

        let Some(event) = self.parser.parse(line) else {
            return true;
        };
        self.counters.events_parsed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::INGEST_EVENTS_PARSED_TOTAL).increment(1);

        if !self.filters.should_keep(&event) {
            self.counters.events_filtered.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(m::INGEST_EVENTS_FILTERED_TOTAL).increment(1);
            return true;
        }

        let now = tokio::time::Instant::now().into_std();
        let suppress = lock_cache(&self.dedup).should_suppress(&event.dedup_key(), now);
        if suppress {
            self.counters.events_suppressed.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(m::INGEST_EVENTS_SUPPRESSED_TOTAL).increment(1);
            return true;
        }

        match self.event_tx.try_send(event) {
            Ok(()) => {
                self.counters.events_forwarded.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                let dropped = self.counters.events_dropped.fetch_add(1, Ordering::Relaxed) + 1;
                metrics::counter!(m::INGEST_EVENTS_DROPPED_TOTAL).increment(1);
                if dropped == 1 || dropped % DROP_WARN_EVERY == 0 {
                    warn!(dropped, "event channel full, dropping events");
                }
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// 배치 플러시 태스크 (배치 버퍼의 유일한 소유자)
struct FlushTask<S: EventSink> {
    buffer: BatchBuffer,
    event_rx: mpsc::Receiver<AccessEvent>,
    sink: Arc<S>,
    interval: Duration,
    counters: Arc<SessionCounters>,
    session_id: Uuid,
}

impl<S: EventSink> FlushTask<S> {
    async fn run(mut self) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                received = self.event_rx.recv() => match received {
                    Some(event) => {
                        self.buffer.add(event);
                        if let Some(batch) = self.buffer.flush_if_due() {
                            self.deliver(batch, "threshold").await;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if let Some(batch) = self.buffer.force_flush() {
                        self.deliver(batch, "interval").await;
                    }
                }
            }
        }

        // 채널이 닫힘: 남은 이벤트 최종 플러시
        if let Some(batch) = self.buffer.force_flush() {
            self.deliver(batch, "shutdown").await;
        }
        debug!(
            session = %self.session_id,
            received = self.buffer.total_received(),
            batches = self.buffer.batches_flushed(),
            "flush task exited"
        );
    }

    /// 배치를 저장소에 기록합니다. 실패한 배치는 재시도하지 않습니다.
    async fn deliver(&self, batch: Vec<AccessEvent>, reason: &'static str) {
        let count = batch.len();
        match self.sink.insert_batch(batch).await {
            Ok(()) => {
                self.counters.batches_flushed.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .events_flushed
                    .fetch_add(count as u64, Ordering::Relaxed);
                metrics::counter!(m::INGEST_BATCHES_FLUSHED_TOTAL).increment(1);
                debug!(session = %self.session_id, count, reason, "flushed batch");
            }
            Err(e) => {
                self.counters.sink_failures.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::INGEST_SINK_FAILURES_TOTAL).increment(1);
                error!(
                    session = %self.session_id,
                    count,
                    reason,
                    error = %e,
                    "failed to store batch, events discarded"
                );
            }
        }
    }
}

/// 중복 제거 캐시 정리 태스크
struct CleanupTask {
    dedup: Arc<Mutex<DedupCache>>,
    interval: Duration,
    counters: Arc<SessionCounters>,
    cancel: CancellationToken,
}

impl CleanupTask {
    async fn run(self) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let now = tokio::time::Instant::now().into_std();
                    let (evicted, remaining) = {
                        let mut cache = lock_cache(&self.dedup);
                        (cache.cleanup(now), cache.len())
                    };
                    metrics::gauge!(m::INGEST_DEDUP_CACHE_SIZE).set(remaining as f64);
                    if evicted > 0 {
                        self.counters
                            .dedup_evicted
                            .fetch_add(evicted as u64, Ordering::Relaxed);
                        debug!(evicted, remaining, "dedup cache cleaned");
                    }
                }
            }
        }
    }
}
