use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use super::call::CallRecord;

/// Reporting period for an agent's statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    #[default]
    Today,
    Week,
    Month,
    Custom,
}

impl PeriodKind {
    pub fn display_name(&self) -> &str {
        match self {
            PeriodKind::Today => "Today",
            PeriodKind::Week => "This Week",
            PeriodKind::Month => "This Month",
            PeriodKind::Custom => "Custom",
        }
    }
}

/// Per-queue call totals, created lazily on the first call tagged
/// with a new queue name.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueStatistics {
    #[serde(rename = "callsHandled")]
    pub calls_handled: u64,
    #[serde(rename = "talkTime")]
    pub talk_time: u64,
}

/// One hour-of-day bucket: call count and talk time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HourlyStats {
    pub calls: u64,
    #[serde(rename = "talkTime")]
    pub talk_time: u64,
}

/// Derived KPIs, recomputed in full from the running totals after
/// every mutation. Never incrementally updated, to avoid drift.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PerformanceMetrics {
    #[serde(rename = "callsPerHour")]
    pub calls_per_hour: f64,
    #[serde(rename = "avgHandleTime")]
    pub avg_handle_time: f64,
    #[serde(rename = "avgTalkTime")]
    pub avg_talk_time: f64,
    #[serde(rename = "avgWrapTime")]
    pub avg_wrap_time: f64,
    #[serde(rename = "avgHoldTime")]
    pub avg_hold_time: f64,
    #[serde(rename = "firstCallResolution")]
    pub first_call_resolution: f64,
    #[serde(rename = "serviceLevel")]
    pub service_level: f64,
    pub occupancy: f64,
    pub utilization: f64,
    #[serde(rename = "avgQualityScore")]
    pub avg_quality_score: f64,
    #[serde(rename = "transferRate")]
    pub transfer_rate: f64,
    #[serde(rename = "holdRate")]
    pub hold_rate: f64,
}

/// Performance grade label derived from the overall score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceGrade {
    Excellent,
    Good,
    #[default]
    Average,
    NeedsImprovement,
    Critical,
}

impl PerformanceGrade {
    pub fn display_name(&self) -> &str {
        match self {
            PerformanceGrade::Excellent => "Excellent",
            PerformanceGrade::Good => "Good",
            PerformanceGrade::Average => "Average",
            PerformanceGrade::NeedsImprovement => "Needs Improvement",
            PerformanceGrade::Critical => "Critical",
        }
    }
}

/// Running statistics for one agent over the active period.
///
/// All counters are cumulative; derived KPIs live in `performance` and
/// are rebuilt from the counters after every mutation. The recent-call
/// ring is newest first and capped by the tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentStatistics {
    #[serde(rename = "agentId")]
    pub agent_id: String,
    pub interface: String,
    #[serde(rename = "displayName")]
    pub display_name: String,

    pub period: PeriodKind,
    #[serde(rename = "periodStart")]
    pub period_start: DateTime<Utc>,
    #[serde(rename = "periodEnd")]
    pub period_end: DateTime<Utc>,

    #[serde(rename = "totalCalls")]
    pub total_calls: u64,
    #[serde(rename = "inboundCalls")]
    pub inbound_calls: u64,
    #[serde(rename = "outboundCalls")]
    pub outbound_calls: u64,
    #[serde(rename = "internalCalls")]
    pub internal_calls: u64,
    #[serde(rename = "missedCalls")]
    pub missed_calls: u64,
    #[serde(rename = "transferredCalls")]
    pub transferred_calls: u64,
    #[serde(rename = "voicemailCalls")]
    pub voicemail_calls: u64,

    #[serde(rename = "totalTalkTime")]
    pub total_talk_time: u64,
    #[serde(rename = "totalHoldTime")]
    pub total_hold_time: u64,
    #[serde(rename = "totalWrapTime")]
    pub total_wrap_time: u64,
    #[serde(rename = "totalHandleTime")]
    pub total_handle_time: u64,
    #[serde(rename = "totalLoginTime")]
    pub total_login_time: u64,
    #[serde(rename = "totalAvailableTime")]
    pub total_available_time: u64,
    #[serde(rename = "totalPausedTime")]
    pub total_paused_time: u64,
    #[serde(rename = "totalOnCallTime")]
    pub total_on_call_time: u64,

    /// Calls with a connected disposition (answered or transferred);
    /// denominator for the per-call averages.
    #[serde(rename = "answeredCalls")]
    pub answered_calls: u64,
    /// Calls that carried wait-time data; service-level denominator.
    #[serde(rename = "callsWithWaitData")]
    pub calls_with_wait_data: u64,
    /// Connected calls answered within the service-level threshold.
    #[serde(rename = "callsWithinServiceLevel")]
    pub calls_within_service_level: u64,
    /// Calls with any hold time; hold-rate numerator.
    #[serde(rename = "callsWithHold")]
    pub calls_with_hold: u64,

    pub performance: PerformanceMetrics,
    #[serde(rename = "queueStats")]
    pub queue_stats: BTreeMap<String, QueueStatistics>,
    pub hourly: [HourlyStats; 24],
    #[serde(rename = "recentCalls")]
    pub recent_calls: VecDeque<CallRecord>,
    pub grade: PerformanceGrade,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

impl AgentStatistics {
    /// Fresh zero-state statistics for an agent, period defaulting to today.
    pub fn new(agent_id: impl Into<String>, interface: impl Into<String>, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            agent_id: agent_id.into(),
            interface: interface.into(),
            display_name: display_name.into(),
            period: PeriodKind::Today,
            period_start: now,
            period_end: now,
            total_calls: 0,
            inbound_calls: 0,
            outbound_calls: 0,
            internal_calls: 0,
            missed_calls: 0,
            transferred_calls: 0,
            voicemail_calls: 0,
            total_talk_time: 0,
            total_hold_time: 0,
            total_wrap_time: 0,
            total_handle_time: 0,
            total_login_time: 0,
            total_available_time: 0,
            total_paused_time: 0,
            total_on_call_time: 0,
            answered_calls: 0,
            calls_with_wait_data: 0,
            calls_within_service_level: 0,
            calls_with_hold: 0,
            performance: PerformanceMetrics::default(),
            queue_stats: BTreeMap::new(),
            hourly: [HourlyStats::default(); 24],
            recent_calls: VecDeque::new(),
            grade: PerformanceGrade::default(),
            last_updated: now,
        }
    }
}
