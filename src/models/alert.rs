use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Metric a threshold can be attached to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum MetricName {
    CallsPerHour,
    AvgHandleTime,
    AvgTalkTime,
    ServiceLevel,
    Occupancy,
    Utilization,
    TransferRate,
    HoldRate,
    MissedCalls,
}

impl MetricName {
    pub fn display_name(&self) -> &str {
        match self {
            MetricName::CallsPerHour => "Calls per Hour",
            MetricName::AvgHandleTime => "Avg Handle Time",
            MetricName::AvgTalkTime => "Avg Talk Time",
            MetricName::ServiceLevel => "Service Level",
            MetricName::Occupancy => "Occupancy",
            MetricName::Utilization => "Utilization",
            MetricName::TransferRate => "Transfer Rate",
            MetricName::HoldRate => "Hold Rate",
            MetricName::MissedCalls => "Missed Calls",
        }
    }
}

/// Configured breach boundaries for one metric.
///
/// When `higher_is_better` the metric breaches by dropping below a
/// threshold, otherwise by rising above it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AlertThreshold {
    pub metric: MetricName,
    #[serde(rename = "warningThreshold")]
    pub warning_threshold: f64,
    #[serde(rename = "criticalThreshold")]
    pub critical_threshold: f64,
    #[serde(rename = "higherIsBetter")]
    pub higher_is_better: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn display_name(&self) -> &str {
        match self {
            AlertSeverity::Warning => "Warning",
            AlertSeverity::Critical => "Critical",
        }
    }
}

/// A raised threshold breach. Acknowledging keeps the alert in the
/// list but removes it from the unread count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: String,
    pub severity: AlertSeverity,
    pub metric: MetricName,
    #[serde(rename = "warningThreshold")]
    pub warning_threshold: f64,
    #[serde(rename = "criticalThreshold")]
    pub critical_threshold: f64,
    #[serde(rename = "higherIsBetter")]
    pub higher_is_better: bool,
    /// Metric value at the moment of the breach
    pub value: f64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
}
