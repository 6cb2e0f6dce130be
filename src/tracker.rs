//! Tracking controller
//!
//! Wires the pipeline together: normalized event delivery into the
//! aggregation state, alert evaluation after every mutation, debounced
//! persistence, and the host-facing lifecycle. All mutations run
//! single-writer behind one RwLock; queries take read snapshots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::alerts::AlertEngine;
use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::event::{AmiMessage, EventNormalizer};
use crate::export;
use crate::models::{AgentStatistics, Alert, CallRecord, PeriodKind};
use crate::persist::{self, KeyValueStore, PersistedState, PersistenceWriter, DEFAULT_DEBOUNCE};
use crate::query::{self, HistoryFilter, HourlyEntry, QueueStatsEntry, TeamComparison};

/// Error string stored and surfaced when no upstream client is wired;
/// matches the display of [`TrackerError::ClientUnavailable`].
pub const AMI_NOT_AVAILABLE: &str = "AMI client not available";

pub type StatsCallback = Arc<dyn Fn(&AgentStatistics) + Send + Sync>;
pub type AlertCallback = Arc<dyn Fn(&Alert) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

struct TrackerInner {
    config: TrackerConfig,
    stats: AgentStatistics,
    alerts: AlertEngine,
    normalizer: EventNormalizer,
    last_error: Option<String>,
    on_stats_update: Option<StatsCallback>,
    on_alert: Option<AlertCallback>,
    on_error: Option<ErrorCallback>,
    store: Option<Arc<dyn KeyValueStore>>,
    writer: Option<PersistenceWriter>,
    cancel: CancellationToken,
}

impl TrackerInner {
    /// Run after every mutating operation: alert evaluation, host
    /// callbacks, persistence scheduling.
    fn after_mutation(&mut self) {
        let raised = self.alerts.evaluate(&self.stats);
        if let Some(on_alert) = &self.on_alert {
            for alert in &raised {
                on_alert(alert);
            }
        }
        if self.config.realtime_updates {
            if let Some(on_stats_update) = &self.on_stats_update {
                on_stats_update(&self.stats);
            }
        }
        self.schedule_persist();
    }

    fn schedule_persist(&self) {
        if let Some(writer) = &self.writer {
            writer.schedule(&self.snapshot());
        }
    }

    fn snapshot(&self) -> PersistedState {
        PersistedState {
            stats: vec![self.stats.clone()],
            alerts: self.alerts.alerts().to_vec(),
        }
    }

    fn apply_record(&mut self, record: CallRecord) {
        if self.stats.record_call(record, &self.config) {
            self.after_mutation();
        }
    }
}

/// Per-agent statistics tracker and alerting engine.
///
/// Construct via [`AgentTrackerBuilder`] or [`AgentTracker::new`],
/// then call `start` with the upstream message receiver; `stop`
/// deregisters and flushes. Both are idempotent.
pub struct AgentTracker {
    inner: Arc<RwLock<TrackerInner>>,
    active: Arc<AtomicBool>,
}

impl AgentTracker {
    /// Build a tracker from a validated configuration.
    pub fn new(config: TrackerConfig) -> TrackerResult<Self> {
        Self::from_parts(config, None, None, None, None)
    }

    fn from_parts(
        config: TrackerConfig,
        store: Option<Arc<dyn KeyValueStore>>,
        on_stats_update: Option<StatsCallback>,
        on_alert: Option<AlertCallback>,
        on_error: Option<ErrorCallback>,
    ) -> TrackerResult<Self> {
        config.validate()?;
        let stats = AgentStatistics::new(
            config.agent_id.clone(),
            config.interface_label().to_string(),
            config.display_name().to_string(),
        );
        let inner = TrackerInner {
            normalizer: EventNormalizer::new(&config),
            alerts: AlertEngine::new(config.alert_thresholds.clone()),
            stats,
            config,
            last_error: None,
            on_stats_update,
            on_alert,
            on_error,
            store,
            writer: None,
            cancel: CancellationToken::new(),
        };
        Ok(Self {
            inner: Arc::new(RwLock::new(inner)),
            active: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn builder(agent_id: impl Into<String>) -> AgentTrackerBuilder {
        AgentTrackerBuilder::new(agent_id)
    }

    /// Begin tracking: hydrate persisted state when enabled, then
    /// consume messages from `events` until `stop` or the sender side
    /// closes. Starting while already active is a no-op.
    pub async fn start(&self, events: mpsc::Receiver<AmiMessage>) -> TrackerResult<()> {
        if self.active.swap(true, Ordering::SeqCst) {
            tracing::debug!("Tracker already active; start is a no-op");
            return Ok(());
        }

        let mut inner = self.inner.write().await;
        inner.cancel = CancellationToken::new();

        if inner.config.persistence {
            if let Some(store) = inner.store.clone() {
                if let Some(state) = persist::load(store.as_ref(), &inner.config.storage_key).await
                {
                    let agent_id = inner.config.agent_id.clone();
                    if let Some(stats) = state.stats.into_iter().find(|s| s.agent_id == agent_id) {
                        tracing::info!(
                            "Hydrated persisted stats for agent {} ({} calls)",
                            agent_id,
                            stats.total_calls
                        );
                        inner.stats = stats;
                    }
                    inner.alerts.hydrate(state.alerts);
                }
                inner.writer = Some(PersistenceWriter::spawn(
                    store,
                    inner.config.storage_key.clone(),
                    DEFAULT_DEBOUNCE,
                ));
            }
        }

        let token = inner.cancel.clone();
        drop(inner);

        let inner = self.inner.clone();
        let active = self.active.clone();
        let mut events = events;
        tokio::spawn(async move {
            tracing::info!("Agent tracker ingest loop started");
            let mut channel_closed = false;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    message = events.recv() => {
                        match message {
                            Some(message) => {
                                let mut inner = inner.write().await;
                                process_message(&mut inner, &message);
                            }
                            None => {
                                tracing::debug!("Upstream event channel closed");
                                channel_closed = true;
                                break;
                            }
                        }
                    }
                }
            }
            // Nobody calls stop on this path, so flush here
            if channel_closed {
                let inner = inner.read().await;
                if inner.config.persistence {
                    if let Some(store) = inner.store.clone() {
                        persist::save_now(store.as_ref(), &inner.config.storage_key, &inner.snapshot())
                            .await;
                    }
                }
            }
            active.store(false, Ordering::SeqCst);
            tracing::info!("Agent tracker ingest loop stopped");
        });

        Ok(())
    }

    /// Stop tracking: cancel the ingest loop, flush persistence.
    /// Stopping while inactive is a no-op.
    pub async fn stop(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut inner = self.inner.write().await;
        inner.cancel.cancel();
        if let Some(writer) = inner.writer.take() {
            writer.shutdown();
        }
        if inner.config.persistence {
            if let Some(store) = inner.store.clone() {
                persist::save_now(store.as_ref(), &inner.config.storage_key, &inner.snapshot())
                    .await;
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Deliver one upstream message directly, bypassing the channel.
    /// Same pipeline the ingest loop uses.
    pub async fn handle_message(&self, message: &AmiMessage) {
        let mut inner = self.inner.write().await;
        process_message(&mut inner, message);
    }

    /// Record a call captured outside the event feed. Records without
    /// an id are assigned one.
    pub async fn record_call(&self, mut record: CallRecord) {
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        let mut inner = self.inner.write().await;
        inner.apply_record(record);
    }

    /// Attach late-arriving wrap time to a recorded call.
    /// Returns false when the call is no longer in the ring.
    pub async fn record_wrap_time(&self, call_id: &str, seconds: u64) -> bool {
        let mut inner = self.inner.write().await;
        let config = inner.config.clone();
        let updated = inner.stats.update_wrap_time(call_id, seconds, &config);
        if updated {
            inner.after_mutation();
        }
        updated
    }

    /// Add logged-in seconds.
    pub async fn add_login_time(&self, seconds: u64) {
        let mut inner = self.inner.write().await;
        let config = inner.config.clone();
        inner.stats.add_login_time(seconds, &config);
        inner.after_mutation();
    }

    /// Add available (ready, idle) seconds.
    pub async fn add_available_time(&self, seconds: u64) {
        let mut inner = self.inner.write().await;
        let config = inner.config.clone();
        inner.stats.add_available_time(seconds, &config);
        inner.after_mutation();
    }

    /// Add paused (break) seconds.
    pub async fn add_paused_time(&self, seconds: u64) {
        let mut inner = self.inner.write().await;
        let config = inner.config.clone();
        inner.stats.add_paused_time(seconds, &config);
        inner.after_mutation();
    }

    /// Switch the reporting period; counters reset, configuration
    /// survives.
    pub async fn set_period(
        &self,
        kind: PeriodKind,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) {
        let mut inner = self.inner.write().await;
        inner.stats.set_period(kind, start, end);
        inner.after_mutation();
    }

    /// Zero all counters for the current period.
    pub async fn reset_stats(&self) {
        let mut inner = self.inner.write().await;
        inner.stats.reset_counters();
        inner.after_mutation();
    }

    /// Re-emit the current stats. With no upstream client wired this
    /// resolves cleanly, stores the known error string and invokes
    /// `on_error` instead of failing.
    pub async fn refresh(&self) -> TrackerResult<()> {
        let mut inner = self.inner.write().await;
        if !self.active.load(Ordering::SeqCst) {
            let error = TrackerError::ClientUnavailable.to_string();
            if let Some(on_error) = &inner.on_error {
                on_error(&error);
            }
            inner.last_error = Some(error);
            tracing::warn!("Refresh requested without an upstream client");
            return Ok(());
        }
        inner.last_error = None;
        if let Some(on_stats_update) = &inner.on_stats_update {
            on_stats_update(&inner.stats);
        }
        Ok(())
    }

    /// The stored error from the last failed refresh, if any.
    pub async fn last_error(&self) -> Option<String> {
        self.inner.read().await.last_error.clone()
    }

    /// Snapshot of the full statistics state.
    pub async fn stats(&self) -> AgentStatistics {
        self.inner.read().await.stats.clone()
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.inner.read().await.alerts.alerts().to_vec()
    }

    /// Count of unacknowledged alerts.
    pub async fn alert_count(&self) -> usize {
        self.inner.read().await.alerts.unacknowledged_count()
    }

    pub async fn acknowledge_alert(&self, id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let acknowledged = inner.alerts.acknowledge(id);
        if acknowledged {
            inner.schedule_persist();
        }
        acknowledged
    }

    pub async fn acknowledge_all_alerts(&self) {
        let mut inner = self.inner.write().await;
        inner.alerts.acknowledge_all();
        inner.schedule_persist();
    }

    pub async fn queue_stats(&self, queue: Option<&str>) -> Vec<QueueStatsEntry> {
        query::queue_stats(&self.inner.read().await.stats, queue)
    }

    pub async fn hourly_breakdown(&self) -> Vec<HourlyEntry> {
        query::hourly_breakdown(&self.inner.read().await.stats)
    }

    pub async fn peak_hours(&self, limit: usize) -> Vec<HourlyEntry> {
        query::peak_hours(&self.inner.read().await.stats, limit)
    }

    pub async fn top_queues(&self, limit: usize) -> Vec<QueueStatsEntry> {
        query::top_queues(&self.inner.read().await.stats, limit)
    }

    pub async fn compare_to_team(&self, peers: &[AgentStatistics]) -> Option<TeamComparison> {
        query::compare_to_team(&self.inner.read().await.stats, peers)
    }

    pub async fn call_history(
        &self,
        filter: Option<&HistoryFilter>,
        limit: Option<usize>,
    ) -> Vec<CallRecord> {
        query::call_history(&self.inner.read().await.stats, filter, limit)
    }

    pub async fn export_csv(&self) -> String {
        export::export_csv(&self.inner.read().await.stats)
    }

    pub async fn export_json(&self) -> TrackerResult<String> {
        export::export_json(&self.inner.read().await.stats)
    }
}

fn process_message(inner: &mut TrackerInner, message: &AmiMessage) {
    match inner.normalizer.normalize(message) {
        Some(record) => {
            tracing::debug!("Recording call {} from event feed", record.id);
            inner.apply_record(record);
        }
        None => {
            tracing::debug!("Dropped event {:?}", message.data.event);
        }
    }
}

/// Fluent construction for [`AgentTracker`]
pub struct AgentTrackerBuilder {
    config: TrackerConfig,
    store: Option<Arc<dyn KeyValueStore>>,
    on_stats_update: Option<StatsCallback>,
    on_alert: Option<AlertCallback>,
    on_error: Option<ErrorCallback>,
}

impl AgentTrackerBuilder {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            config: TrackerConfig::new(agent_id),
            store: None,
            on_stats_update: None,
            on_alert: None,
            on_error: None,
        }
    }

    pub fn interface(mut self, interface: &str) -> Self {
        self.config.interface = Some(interface.to_string());
        self
    }

    pub fn display_name(mut self, name: &str) -> Self {
        self.config.display_name = Some(name.to_string());
        self
    }

    /// Restrict tracking to these queues.
    pub fn queues(mut self, queues: Vec<String>) -> Self {
        self.config.queues = Some(queues);
        self
    }

    pub fn max_recent_calls(mut self, max: usize) -> Self {
        self.config.max_recent_calls = max;
        self
    }

    pub fn service_level_threshold(mut self, seconds: u64) -> Self {
        self.config.service_level_threshold_secs = seconds;
        self
    }

    pub fn alert_thresholds(mut self, thresholds: Vec<crate::models::AlertThreshold>) -> Self {
        self.config.alert_thresholds = thresholds;
        self
    }

    pub fn grade_policy(mut self, policy: crate::config::GradePolicy) -> Self {
        self.config.grade_policy = policy;
        self
    }

    pub fn realtime_updates(mut self, enabled: bool) -> Self {
        self.config.realtime_updates = enabled;
        self
    }

    /// Enable persistence under `key` against the given store.
    pub fn persistence(mut self, store: Arc<dyn KeyValueStore>, key: &str) -> Self {
        self.config.persistence = true;
        self.config.storage_key = key.to_string();
        self.store = Some(store);
        self
    }

    pub fn on_stats_update(mut self, callback: impl Fn(&AgentStatistics) + Send + Sync + 'static) -> Self {
        self.on_stats_update = Some(Arc::new(callback));
        self
    }

    pub fn on_alert(mut self, callback: impl Fn(&Alert) + Send + Sync + 'static) -> Self {
        self.on_alert = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> TrackerResult<AgentTracker> {
        AgentTracker::from_parts(
            self.config,
            self.store,
            self.on_stats_update,
            self.on_alert,
            self.on_error,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CallDirection, CallDisposition};
    use std::sync::atomic::AtomicUsize;

    fn manual_call(id: &str, talk: u64) -> CallRecord {
        let now = Utc::now();
        CallRecord {
            id: id.to_string(),
            queue: Some("support".to_string()),
            remote_party: "caller".to_string(),
            direction: CallDirection::Inbound,
            started_at: now,
            answered_at: Some(now),
            ended_at: now,
            wait_time: Some(5),
            talk_time: talk,
            hold_time: 0,
            wrap_time: 0,
            disposition: CallDisposition::Answered,
            transfer_target: None,
            recorded: false,
        }
    }

    #[test]
    fn test_empty_agent_id_rejected_at_construction() {
        let result = AgentTracker::new(TrackerConfig::default());
        assert!(matches!(result, Err(TrackerError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_manual_recording_api() {
        let tracker = AgentTracker::builder("1001").build().unwrap();
        tracker.record_call(manual_call("m1", 90)).await;
        tracker.record_call(manual_call("m2", 30)).await;

        let stats = tracker.stats().await;
        assert_eq!(stats.total_calls, 2);
        assert_eq!(stats.total_talk_time, 120);

        assert!(tracker.record_wrap_time("m1", 15).await);
        assert!(!tracker.record_wrap_time("ghost", 15).await);
        assert_eq!(tracker.stats().await.total_wrap_time, 15);
    }

    #[tokio::test]
    async fn test_record_without_id_gets_one() {
        let tracker = AgentTracker::builder("1001").build().unwrap();
        tracker.record_call(manual_call("", 10)).await;
        let history = tracker.call_history(None, None).await;
        assert!(!history[0].id.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_without_upstream_stores_error() {
        let seen = Arc::new(std::sync::Mutex::new(None::<String>));
        let seen_clone = seen.clone();
        let tracker = AgentTracker::builder("1001")
            .on_error(move |e| {
                *seen_clone.lock().unwrap() = Some(e.to_string());
            })
            .build()
            .unwrap();

        tracker.refresh().await.unwrap();
        assert_eq!(tracker.last_error().await.as_deref(), Some(AMI_NOT_AVAILABLE));
        assert_eq!(seen.lock().unwrap().as_deref(), Some(AMI_NOT_AVAILABLE));
        // The constant is the display of the typed error
        assert_eq!(TrackerError::ClientUnavailable.to_string(), AMI_NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn test_on_alert_and_stats_callbacks_fire() {
        let alerts_seen = Arc::new(AtomicUsize::new(0));
        let updates_seen = Arc::new(AtomicUsize::new(0));
        let a = alerts_seen.clone();
        let u = updates_seen.clone();

        let tracker = AgentTracker::builder("1001")
            .alert_thresholds(vec![crate::models::AlertThreshold {
                metric: crate::models::MetricName::MissedCalls,
                warning_threshold: 0.5,
                critical_threshold: 2.5,
                higher_is_better: false,
            }])
            .on_alert(move |_| {
                a.fetch_add(1, Ordering::SeqCst);
            })
            .on_stats_update(move |_| {
                u.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        let mut missed = manual_call("x1", 0);
        missed.disposition = CallDisposition::Missed;
        missed.answered_at = None;
        tracker.record_call(missed).await;

        assert_eq!(alerts_seen.load(Ordering::SeqCst), 1);
        assert_eq!(updates_seen.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.alert_count().await, 1);
    }

    #[tokio::test]
    async fn test_acknowledge_flow() {
        let tracker = AgentTracker::builder("1001")
            .alert_thresholds(vec![crate::models::AlertThreshold {
                metric: crate::models::MetricName::MissedCalls,
                warning_threshold: 0.5,
                critical_threshold: 2.5,
                higher_is_better: false,
            }])
            .build()
            .unwrap();

        let mut missed = manual_call("x1", 0);
        missed.disposition = CallDisposition::Missed;
        tracker.record_call(missed).await;
        assert_eq!(tracker.alert_count().await, 1);

        let id = tracker.alerts().await[0].id.clone();
        assert!(tracker.acknowledge_alert(&id).await);
        assert_eq!(tracker.alert_count().await, 0);

        tracker.acknowledge_all_alerts().await;
        assert_eq!(tracker.alert_count().await, 0);
    }

    #[tokio::test]
    async fn test_set_period_resets_through_controller() {
        let tracker = AgentTracker::builder("1001").build().unwrap();
        tracker.record_call(manual_call("m1", 90)).await;
        tracker.set_period(PeriodKind::Week, None, None).await;

        let stats = tracker.stats().await;
        assert_eq!(stats.total_calls, 0);
        assert_eq!(stats.period, PeriodKind::Week);
    }

    #[tokio::test]
    async fn test_idempotent_lifecycle() {
        let tracker = AgentTracker::builder("1001").build().unwrap();
        let (_tx, rx) = mpsc::channel(8);
        tracker.start(rx).await.unwrap();
        assert!(tracker.is_active());

        // Second start with a fresh channel is a no-op
        let (_tx2, rx2) = mpsc::channel(8);
        tracker.start(rx2).await.unwrap();

        tracker.stop().await;
        assert!(!tracker.is_active());
        // Second stop is a no-op
        tracker.stop().await;
    }
}
