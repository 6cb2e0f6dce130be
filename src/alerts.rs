//! Threshold alerting
//!
//! One state machine per configured metric: clear -> warning ->
//! critical -> clear. Alerts are only raised on upward transitions, so
//! a metric sitting in breach across many events produces exactly one
//! alert until it clears and breaches again.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    AgentStatistics, Alert, AlertSeverity, AlertThreshold, MetricName,
};

/// Alert history cap; oldest entries are evicted beyond this.
const MAX_ALERTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum BreachLevel {
    Clear,
    Warning,
    Critical,
}

/// Evaluates thresholds after every recompute and manages the alert
/// list with acknowledge/dismiss state.
#[derive(Debug)]
pub struct AlertEngine {
    thresholds: Vec<AlertThreshold>,
    states: HashMap<MetricName, BreachLevel>,
    alerts: Vec<Alert>,
}

impl AlertEngine {
    pub fn new(thresholds: Vec<AlertThreshold>) -> Self {
        Self {
            thresholds,
            states: HashMap::new(),
            alerts: Vec::new(),
        }
    }

    /// Replace the alert list from a persisted snapshot. Breach states
    /// are seeded from the unacknowledged alerts so hydration does not
    /// immediately re-raise what was already alerted on.
    pub fn hydrate(&mut self, alerts: Vec<Alert>) {
        self.states.clear();
        for alert in alerts.iter().filter(|a| !a.acknowledged) {
            let level = match alert.severity {
                AlertSeverity::Warning => BreachLevel::Warning,
                AlertSeverity::Critical => BreachLevel::Critical,
            };
            let state = self.states.entry(alert.metric).or_insert(BreachLevel::Clear);
            if level > *state {
                *state = level;
            }
        }
        self.alerts = alerts;
        // Same eviction order as evaluate: oldest out first
        if self.alerts.len() > MAX_ALERTS {
            let excess = self.alerts.len() - MAX_ALERTS;
            self.alerts.drain(..excess);
        }
    }

    /// Evaluate every configured threshold against the current stats.
    /// Returns the newly raised alerts, oldest first.
    pub fn evaluate(&mut self, stats: &AgentStatistics) -> Vec<Alert> {
        let mut raised = Vec::new();
        for threshold in &self.thresholds {
            let value = metric_value(stats, threshold.metric);
            let level = breach_level(threshold, value);
            let state = self
                .states
                .entry(threshold.metric)
                .or_insert(BreachLevel::Clear);

            if level > *state {
                let severity = match level {
                    BreachLevel::Warning => AlertSeverity::Warning,
                    BreachLevel::Critical => AlertSeverity::Critical,
                    BreachLevel::Clear => unreachable!("clear never exceeds a prior state"),
                };
                tracing::warn!(
                    "Alert: {} {} at {:.1} (warning {:.1}, critical {:.1})",
                    threshold.metric.display_name(),
                    severity.display_name(),
                    value,
                    threshold.warning_threshold,
                    threshold.critical_threshold,
                );
                raised.push(Alert {
                    id: Uuid::new_v4().to_string(),
                    severity,
                    metric: threshold.metric,
                    warning_threshold: threshold.warning_threshold,
                    critical_threshold: threshold.critical_threshold,
                    higher_is_better: threshold.higher_is_better,
                    value,
                    created_at: Utc::now(),
                    acknowledged: false,
                });
            }
            *state = level;
        }

        for alert in &raised {
            if self.alerts.len() >= MAX_ALERTS {
                self.alerts.remove(0);
            }
            self.alerts.push(alert.clone());
        }
        raised
    }

    /// Mark one alert as read. Returns false for unknown ids.
    pub fn acknowledge(&mut self, id: &str) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                true
            }
            None => false,
        }
    }

    /// Clear the whole alert list. Breach states survive, so metrics
    /// still in breach do not immediately re-raise.
    pub fn acknowledge_all(&mut self) {
        self.alerts.clear();
    }

    /// The alert count surfaced to hosts: unacknowledged alerts only.
    pub fn unacknowledged_count(&self) -> usize {
        self.alerts.iter().filter(|a| !a.acknowledged).count()
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }
}

fn breach_level(threshold: &AlertThreshold, value: f64) -> BreachLevel {
    if threshold.higher_is_better {
        if value < threshold.critical_threshold {
            BreachLevel::Critical
        } else if value < threshold.warning_threshold {
            BreachLevel::Warning
        } else {
            BreachLevel::Clear
        }
    } else if value > threshold.critical_threshold {
        BreachLevel::Critical
    } else if value > threshold.warning_threshold {
        BreachLevel::Warning
    } else {
        BreachLevel::Clear
    }
}

/// Current value of a metric, read from the derived KPIs or the raw
/// counters.
fn metric_value(stats: &AgentStatistics, metric: MetricName) -> f64 {
    match metric {
        MetricName::CallsPerHour => stats.performance.calls_per_hour,
        MetricName::AvgHandleTime => stats.performance.avg_handle_time,
        MetricName::AvgTalkTime => stats.performance.avg_talk_time,
        MetricName::ServiceLevel => stats.performance.service_level,
        MetricName::Occupancy => stats.performance.occupancy,
        MetricName::Utilization => stats.performance.utilization,
        MetricName::TransferRate => stats.performance.transfer_rate,
        MetricName::HoldRate => stats.performance.hold_rate,
        MetricName::MissedCalls => stats.missed_calls as f64,
    }
}
