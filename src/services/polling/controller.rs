use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use uuid::Uuid;

use super::congestion::CongestionDetector;
use super::sink::{ResultSink, DEFAULT_RESULT_BUFFER};
use super::store::{StateStore, StoreError};
use super::types::{
    validate_interval, PollEvent, PollOutcome, PollingConfig, PollingError, PollingStatus,
    QueryOrigin, RuntimeState, AUTO_POLLING_STORAGE_KEY, DEFAULT_REFRESH_INTERVAL_SECS,
};
use crate::services::metrics::{PollingMetricsCollector, TickOutcome};
use crate::services::search::{QueryBuilder, QuerySource, SearchError, SearchResponse};

/// Construction options for [`PollingController`]
#[derive(Clone)]
pub struct PollingOptions {
    /// Key the config record is persisted under
    pub state_key: String,
    /// Interval used when nothing valid is persisted
    pub default_interval: u64,
    pub result_buffer: usize,
    pub metrics: Option<PollingMetricsCollector>,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            state_key: AUTO_POLLING_STORAGE_KEY.to_string(),
            default_interval: DEFAULT_REFRESH_INTERVAL_SECS,
            result_buffer: DEFAULT_RESULT_BUFFER,
            metrics: None,
        }
    }
}

struct ControllerState {
    config: PollingConfig,
    runtime: RuntimeState,
    timer: Option<JoinHandle<()>>,
    /// Bumped every time the timer is disposed; ticks from an older
    /// generation are ignored.
    generation: u64,
    /// Bumped by a timer reset; completions from an older cycle are dropped.
    cycle: u64,
    /// Bumped for every config snapshot taken for persistence
    persist_seq: u64,
}

impl ControllerState {
    /// Capture the config as of this transition
    fn snapshot(&mut self) -> ConfigSnapshot {
        self.persist_seq += 1;
        ConfigSnapshot {
            seq: self.persist_seq,
            config: self.config,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ConfigSnapshot {
    seq: u64,
    config: PollingConfig,
}

struct Inner {
    source: Arc<dyn QuerySource>,
    query_builder: QueryBuilder,
    store: Arc<dyn StateStore>,
    sink: ResultSink,
    metrics: Option<PollingMetricsCollector>,
    state_key: String,
    state: Mutex<ControllerState>,
    /// Sequence number of the last snapshot handed to the store
    persist_lock: tokio::sync::Mutex<u64>,
}

/// Auto-refresh polling controller.
///
/// Periodically re-issues the current search descriptor, drops ticks while
/// the previous query is still outstanding (congestion) or while the
/// operator suppresses polling, and persists its active flag and interval
/// after every transition that should survive a restart.
///
/// Must be created and used inside a tokio runtime. Clones share the same
/// controller.
#[derive(Clone)]
pub struct PollingController {
    inner: Arc<Inner>,
}

impl PollingController {
    /// Build a controller and restore the persisted config.
    ///
    /// A persisted `active: true` record starts polling immediately, eager
    /// query included.
    pub async fn new(
        source: Arc<dyn QuerySource>,
        query_builder: QueryBuilder,
        store: Arc<dyn StateStore>,
        options: PollingOptions,
    ) -> Self {
        let default_interval = if let Err(e) = validate_interval(options.default_interval) {
            tracing::warn!("{}, using {}s", e, DEFAULT_REFRESH_INTERVAL_SECS);
            DEFAULT_REFRESH_INTERVAL_SECS
        } else {
            options.default_interval
        };

        let config = PollingConfig {
            active: false,
            refresh_interval: default_interval,
        };

        if let Some(metrics) = &options.metrics {
            metrics.set_active(false);
            metrics.set_suppressed(false);
            metrics.set_refresh_interval(config.refresh_interval);
        }

        let controller = Self {
            inner: Arc::new(Inner {
                source,
                query_builder,
                store,
                sink: ResultSink::new(options.result_buffer),
                metrics: options.metrics,
                state_key: options.state_key,
                state: Mutex::new(ControllerState {
                    config,
                    runtime: RuntimeState::default(),
                    timer: None,
                    generation: 0,
                    cycle: 0,
                    persist_seq: 0,
                }),
                persist_lock: tokio::sync::Mutex::new(0),
            }),
        };

        controller.restore_state().await;
        controller
    }

    pub async fn start(&self) {
        let snapshot = {
            let mut state = self.inner.lock();
            if !state.config.active {
                self.inner.issue_query(&mut state, QueryOrigin::Eager);
                state.config.active = true;
                self.inner.arm_timer(&mut state);

                if let Some(metrics) = &self.inner.metrics {
                    metrics.set_active(true);
                }
                tracing::info!(
                    "Polling started (interval: {}s)",
                    state.config.refresh_interval
                );
            }
            state.snapshot()
        };

        self.inner.persist_state(snapshot).await;
    }

    /// Stop polling. With `persist == false` the stopped state is not
    /// written, so the next launch resumes from the last persisted record.
    pub async fn stop(&self, persist: bool) {
        let snapshot = {
            let mut state = self.inner.lock();
            state.config.active = false;
            Inner::dispose_timer(&mut state);

            if let Some(metrics) = &self.inner.metrics {
                metrics.set_active(false);
            }
            persist.then(|| state.snapshot())
        };
        tracing::info!("Polling stopped (persist: {})", persist);

        if let Some(snapshot) = snapshot {
            self.inner.persist_state(snapshot).await;
        }
    }

    pub fn set_suppression(&self, suppressed: bool) {
        self.inner.lock().runtime.suppressed = suppressed;

        if let Some(metrics) = &self.inner.metrics {
            metrics.set_suppressed(suppressed);
        }
        tracing::debug!("Polling suppression set to {}", suppressed);
    }

    /// Discard the in-flight cycle and restart the timer at the current
    /// interval, staying Active. Queries still outstanding keep running but
    /// no longer count as pending and their results are dropped. The next
    /// tick lands a full interval from now. No-op while Stopped.
    pub fn drop_next_and_continue(&self) {
        let mut state = self.inner.lock();
        if state.config.active {
            self.inner.reset(&mut state);
            tracing::debug!("Dropped current cycle, timer re-armed");
        }
    }

    /// Out-of-range values are rejected before anything changes.
    /// While Active this resets the timer like `drop_next_and_continue`.
    pub async fn set_interval(&self, seconds: u64) -> Result<(), PollingError> {
        if let Err(e) = validate_interval(seconds) {
            tracing::warn!("Rejected refresh interval: {}", e);
            return Err(e);
        }

        let snapshot = {
            let mut state = self.inner.lock();
            state.config.refresh_interval = seconds;
            if state.config.active {
                self.inner.reset(&mut state);
            }
            state.snapshot()
        };

        if let Some(metrics) = &self.inner.metrics {
            metrics.set_refresh_interval(seconds);
        }
        tracing::info!("Refresh interval set to {}s", seconds);

        self.inner.persist_state(snapshot).await;
        Ok(())
    }

    pub fn get_interval(&self) -> u64 {
        self.inner.lock().config.refresh_interval
    }

    pub fn get_is_polling_active(&self) -> bool {
        self.inner.lock().config.active
    }

    pub fn get_is_congestion(&self) -> bool {
        self.inner.lock().runtime.congested
    }

    pub fn is_suppressed(&self) -> bool {
        self.inner.lock().runtime.suppressed
    }

    pub fn is_pending(&self) -> bool {
        self.inner.lock().runtime.pending()
    }

    pub fn status(&self) -> PollingStatus {
        let state = self.inner.lock();
        PollingStatus {
            active: state.config.active,
            refresh_interval: state.config.refresh_interval,
            pending: state.runtime.pending(),
            congested: state.runtime.congested,
            suppressed: state.runtime.suppressed,
        }
    }

    /// Receive every completed query, failures included
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PollEvent> {
        self.inner.sink.subscribe()
    }

    pub fn query_builder(&self) -> &QueryBuilder {
        &self.inner.query_builder
    }

    /// Disposal hook for the end of the owning session
    pub async fn on_destroy(&self) {
        if self.get_is_polling_active() {
            self.stop(false).await;
        }
    }

    async fn restore_state(&self) {
        let Some(persisted) = self.inner.load_persisted().await else {
            return;
        };

        self.inner.lock().config.refresh_interval = persisted.refresh_interval;
        if let Some(metrics) = &self.inner.metrics {
            metrics.set_refresh_interval(persisted.refresh_interval);
        }
        tracing::info!(
            "Restored polling state (active: {}, interval: {}s)",
            persisted.active,
            persisted.refresh_interval
        );

        if persisted.active {
            self.start().await;
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispose_timer(state: &mut ControllerState) {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation = state.generation.wrapping_add(1);
    }

    /// Start a new cycle and re-arm the timer
    fn reset(self: &Arc<Self>, state: &mut ControllerState) {
        let discarded = state.runtime.outstanding;
        state.cycle = state.cycle.wrapping_add(1);
        state.runtime.outstanding = 0;

        if discarded > 0 {
            tracing::debug!("Discarding {} in-flight query from the previous cycle", discarded);
        }
        if let Some(metrics) = &self.metrics {
            metrics.set_in_flight(0);
        }

        self.arm_timer(state);
    }

    fn arm_timer(self: &Arc<Self>, state: &mut ControllerState) {
        Self::dispose_timer(state);

        // First tick lands one full period after arming
        let period = Duration::from_secs(state.config.refresh_interval);
        state.timer = Some(tokio::spawn(run_timer(
            Arc::downgrade(self),
            state.generation,
            Instant::now() + period,
            period,
        )));
    }

    /// Returns false once the timer that delivered this tick is obsolete
    fn on_tick(self: &Arc<Self>, generation: u64) -> bool {
        let mut state = self.lock();
        if state.generation != generation || !state.config.active {
            return false;
        }

        let was_congested = state.runtime.congested;
        state.runtime.congested = CongestionDetector::detect(state.runtime.pending());

        let outcome = if state.runtime.suppressed {
            TickOutcome::Suppressed
        } else if state.runtime.congested {
            TickOutcome::Congested
        } else {
            TickOutcome::Issued
        };

        match outcome {
            TickOutcome::Suppressed => tracing::debug!("Polling suppressed, tick dropped"),
            TickOutcome::Congested if !was_congested => tracing::warn!(
                "Search backend congested ({} query outstanding), tick dropped",
                state.runtime.outstanding
            ),
            TickOutcome::Congested => tracing::debug!("Still congested, tick dropped"),
            TickOutcome::Issued => self.issue_query(&mut state, QueryOrigin::Tick),
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_tick(outcome);
            metrics.set_congested(state.runtime.congested);
        }

        true
    }

    fn issue_query(self: &Arc<Self>, state: &mut ControllerState, origin: QueryOrigin) {
        state.runtime.outstanding += 1;
        if let Some(metrics) = &self.metrics {
            metrics.set_in_flight(state.runtime.outstanding);
        }

        let request = self.query_builder.search_request();
        let query_id = Uuid::new_v4();
        let cycle = state.cycle;
        tracing::debug!("Issuing {} query {}", origin.as_str(), query_id);

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let started = Instant::now();
            let result = inner.source.search(&request).await;
            inner.complete_query(query_id, origin, cycle, started.elapsed(), result);
        });
    }

    fn complete_query(
        &self,
        query_id: Uuid,
        origin: QueryOrigin,
        cycle: u64,
        elapsed: Duration,
        result: Result<SearchResponse, SearchError>,
    ) {
        let current = {
            let mut state = self.lock();
            let current = state.cycle == cycle;
            if current {
                state.runtime.outstanding = state.runtime.outstanding.saturating_sub(1);
                if let Some(metrics) = &self.metrics {
                    metrics.set_in_flight(state.runtime.outstanding);
                }
            }
            current
        };

        if !current {
            tracing::debug!("Query {} belongs to a discarded cycle, result dropped", query_id);
            if let Some(metrics) = &self.metrics {
                metrics.record_query_discarded(origin);
            }
            return;
        }

        let outcome = match result {
            Ok(response) => {
                tracing::debug!(
                    "Query {} returned {} hits in {}ms",
                    query_id,
                    response.total,
                    elapsed.as_millis()
                );
                PollOutcome::Result(response)
            }
            Err(e) => {
                tracing::error!("Query {} failed after {}ms: {}", query_id, elapsed.as_millis(), e);
                PollOutcome::Failure(e.to_string())
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_query_completed(
                origin,
                matches!(outcome, PollOutcome::Result(_)),
                elapsed,
            );
        }

        self.sink.publish(PollEvent {
            query_id,
            origin,
            completed_at: Utc::now(),
            elapsed_ms: elapsed.as_millis() as u64,
            outcome,
        });
    }

    async fn load_persisted(&self) -> Option<PollingConfig> {
        let loaded = self.store.load(&self.state_key).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_store_operation("load", loaded.is_ok());
        }

        let raw = match loaded {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to load polling state, using defaults: {}", e);
                return None;
            }
        };

        let config = match serde_json::from_str::<PollingConfig>(&raw) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring unreadable polling state: {}", e);
                return None;
            }
        };

        if let Err(e) = config.validate() {
            tracing::warn!("Ignoring invalid polling state: {}", e);
            return None;
        }

        Some(config)
    }

    async fn persist_state(&self, snapshot: ConfigSnapshot) {
        // Writers are serialized; a snapshot older than one already written is stale
        let mut last_written = self.persist_lock.lock().await;
        if *last_written > snapshot.seq {
            tracing::debug!("Skipping stale polling state write #{}", snapshot.seq);
            return;
        }
        *last_written = snapshot.seq;
        let config = snapshot.config;

        let result = match serde_json::to_string(&config) {
            Ok(raw) => self.store.save(&self.state_key, &raw).await,
            Err(e) => Err(StoreError::from(e)),
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_store_operation("save", result.is_ok());
        }

        match result {
            Ok(()) => tracing::debug!(
                "Persisted polling state (active: {}, interval: {}s)",
                config.active,
                config.refresh_interval
            ),
            Err(e) => tracing::warn!("Failed to persist polling state: {}", e),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }
}

async fn run_timer(inner: Weak<Inner>, generation: u64, first_tick: Instant, period: Duration) {
    let mut ticker = interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !inner.on_tick(generation) {
            break;
        }
    }
}
