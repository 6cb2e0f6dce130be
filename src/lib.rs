//! Agent performance telemetry for call centers
//!
//! Ingests a stream of queue call events (or manually submitted call
//! records), maintains running per-agent statistics with per-queue and
//! hourly breakdowns, derives KPIs and a performance grade, raises
//! threshold alerts with acknowledge semantics, and persists the whole
//! state as one blob against a host-supplied key/value store.
//!
//! Features:
//! - Incremental aggregation: O(1) counter work per call, no history rescans
//! - Derived metrics recomputed in full from running totals (no drift)
//! - Debounced threshold alerting with acknowledge/dismiss lifecycle
//! - Peak-hour / top-queue / team-comparison queries
//! - Injection-safe CSV export and structural JSON export
//! - Best-effort debounced persistence, never fatal on load failure
//!
//! ```no_run
//! use agent_telemetry::tracker::AgentTracker;
//! use tokio::sync::mpsc;
//!
//! # async fn run() -> agent_telemetry::error::TrackerResult<()> {
//! let tracker = AgentTracker::builder("1001")
//!     .interface("PJSIP/1001")
//!     .on_alert(|alert| println!("{}: {:.1}", alert.metric.display_name(), alert.value))
//!     .build()?;
//!
//! let (tx, rx) = mpsc::channel(64);
//! tracker.start(rx).await?;
//! # let _ = tx;
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod alerts;
pub mod config;
pub mod error;
pub mod event;
pub mod export;
pub mod metrics;
pub mod models;
pub mod persist;
pub mod query;
pub mod tracker;

pub use config::{GradePolicy, TrackerConfig};
pub use error::{TrackerError, TrackerResult};
pub use event::{AmiEventData, AmiMessage, EventNormalizer};
pub use models::{
    AgentStatistics, Alert, AlertSeverity, AlertThreshold, CallDirection, CallDisposition,
    CallRecord, MetricName, PerformanceGrade, PerformanceMetrics, PeriodKind,
};
pub use persist::{KeyValueStore, MemoryStore, PersistedState};
pub use query::{HistoryFilter, HourlyEntry, QueueStatsEntry, TeamComparison};
pub use tracker::{AgentTracker, AgentTrackerBuilder};
