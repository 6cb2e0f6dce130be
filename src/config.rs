//! Tracker configuration
//!
//! Everything the engine accepts at construction time: agent identity,
//! queue filtering, ring sizing, service-level threshold, alert
//! thresholds, grading policy and persistence settings. Invalid agent
//! identity is a programmer error and is rejected eagerly, before any
//! event is processed.

use serde::{Deserialize, Serialize};

use crate::error::{TrackerError, TrackerResult};
use crate::models::{AlertThreshold, MetricName};

/// Weighting policy for the overall performance score.
///
/// The overall score is the weighted mean of the service level, the
/// occupancy capped at 100, and `100 - handle-time penalty`, where the
/// penalty is the percentage overrun of `target_handle_time_secs`,
/// clamped to 0..=100. The weights are policy, not hidden constants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GradePolicy {
    #[serde(rename = "serviceLevelWeight")]
    pub service_level_weight: f64,
    #[serde(rename = "occupancyWeight")]
    pub occupancy_weight: f64,
    #[serde(rename = "handleTimeWeight")]
    pub handle_time_weight: f64,
    /// Handle time at or below this accrues no penalty
    #[serde(rename = "targetHandleTimeSecs")]
    pub target_handle_time_secs: u64,
}

impl Default for GradePolicy {
    fn default() -> Self {
        Self {
            service_level_weight: 1.0,
            occupancy_weight: 1.0,
            handle_time_weight: 1.0,
            target_handle_time_secs: 300,
        }
    }
}

/// Engine configuration, accepted at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Agent identifier (required, non-empty)
    #[serde(rename = "agentId")]
    pub agent_id: String,

    /// Interface/endpoint label to match events against
    /// (e.g. "PJSIP/1001"); falls back to substring matching on the
    /// agent id when absent
    pub interface: Option<String>,

    /// Display name for exports and team comparison
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,

    /// Queue allow-list; events for other queues are discarded.
    /// None tracks every queue.
    pub queues: Option<Vec<String>>,

    /// Invoke `on_stats_update` after every mutation
    #[serde(rename = "realtimeUpdates")]
    pub realtime_updates: bool,

    /// Capacity of the recent-call ring
    #[serde(rename = "maxRecentCalls")]
    pub max_recent_calls: usize,

    /// Answer-within seconds for the service-level metric
    #[serde(rename = "serviceLevelThresholdSecs")]
    pub service_level_threshold_secs: u64,

    /// Alert threshold definitions, evaluated after every mutation
    #[serde(rename = "alertThresholds")]
    pub alert_thresholds: Vec<AlertThreshold>,

    #[serde(rename = "gradePolicy")]
    pub grade_policy: GradePolicy,

    /// Persist state to the key/value store on mutation
    pub persistence: bool,

    /// Key the state blob is stored under
    #[serde(rename = "storageKey")]
    pub storage_key: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            interface: None,
            display_name: None,
            queues: None,
            realtime_updates: true,
            max_recent_calls: 50,
            service_level_threshold_secs: 20,
            alert_thresholds: default_alert_thresholds(),
            grade_policy: GradePolicy::default(),
            persistence: false,
            storage_key: "agent-telemetry/state".to_string(),
        }
    }
}

impl TrackerConfig {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Self::default()
        }
    }

    /// Display name, falling back to the agent id.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.agent_id)
    }

    /// Interface label, falling back to the bare agent id.
    pub fn interface_label(&self) -> &str {
        self.interface.as_deref().unwrap_or(&self.agent_id)
    }

    /// Validate the configuration. Called at tracker construction.
    pub fn validate(&self) -> TrackerResult<()> {
        if self.agent_id.trim().is_empty() {
            return Err(TrackerError::InvalidConfig(
                "agent id must not be empty".to_string(),
            ));
        }
        if let Some(interface) = &self.interface {
            if interface.trim().is_empty() || interface.contains(char::is_whitespace) {
                return Err(TrackerError::InvalidConfig(format!(
                    "malformed interface pattern: {:?}",
                    interface
                )));
            }
        }
        if self.max_recent_calls == 0 {
            return Err(TrackerError::InvalidConfig(
                "max recent calls must be at least 1".to_string(),
            ));
        }
        for threshold in &self.alert_thresholds {
            let ordered = if threshold.higher_is_better {
                threshold.critical_threshold <= threshold.warning_threshold
            } else {
                threshold.critical_threshold >= threshold.warning_threshold
            };
            if !ordered {
                return Err(TrackerError::InvalidConfig(format!(
                    "threshold for {} has warning/critical in the wrong order",
                    threshold.metric.display_name()
                )));
            }
        }
        Ok(())
    }
}

/// Default alert thresholds: service level dropping, handle time
/// climbing, missed calls piling up.
pub fn default_alert_thresholds() -> Vec<AlertThreshold> {
    vec![
        AlertThreshold {
            metric: MetricName::ServiceLevel,
            warning_threshold: 80.0,
            critical_threshold: 60.0,
            higher_is_better: true,
        },
        AlertThreshold {
            metric: MetricName::AvgHandleTime,
            warning_threshold: 360.0,
            critical_threshold: 600.0,
            higher_is_better: false,
        },
        AlertThreshold {
            metric: MetricName::MissedCalls,
            warning_threshold: 5.0,
            critical_threshold: 10.0,
            higher_is_better: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_invalid_without_agent_id() {
        let config = TrackerConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_config() {
        let config = TrackerConfig::new("1001");
        config.validate().unwrap();
        assert_eq!(config.max_recent_calls, 50);
        assert_eq!(config.service_level_threshold_secs, 20);
        assert_eq!(config.display_name(), "1001");
    }

    #[test]
    fn test_malformed_interface_rejected() {
        let mut config = TrackerConfig::new("1001");
        config.interface = Some("PJSIP 1001".to_string());
        assert!(config.validate().is_err());

        config.interface = Some("PJSIP/1001".to_string());
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_ring_capacity_rejected() {
        let mut config = TrackerConfig::new("1001");
        config.max_recent_calls = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_ordering_checked() {
        let mut config = TrackerConfig::new("1001");
        config.alert_thresholds = vec![AlertThreshold {
            metric: MetricName::ServiceLevel,
            warning_threshold: 60.0,
            critical_threshold: 80.0,
            // Higher is better, so critical must be below warning
            higher_is_better: true,
        }];
        assert!(config.validate().is_err());
    }
}
