//! Read-only views over the aggregation state
//!
//! Everything here takes a statistics snapshot by reference and builds
//! a response value; nothing mutates.

use serde::{Deserialize, Serialize};

use crate::models::{
    AgentStatistics, CallDirection, CallDisposition, CallRecord, PerformanceMetrics,
};

/// One queue's breakdown entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueStatsEntry {
    pub queue: String,
    #[serde(rename = "callsHandled")]
    pub calls_handled: u64,
    #[serde(rename = "talkTime")]
    pub talk_time: u64,
    #[serde(rename = "avgTalkTime")]
    pub avg_talk_time: f64,
}

/// One hour-of-day entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HourlyEntry {
    pub hour: u8,
    pub calls: u64,
    #[serde(rename = "talkTime")]
    pub talk_time: u64,
}

/// Agent KPIs alongside the arithmetic mean of the team's
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamComparison {
    #[serde(rename = "agentId")]
    pub agent_id: String,
    pub agent: PerformanceMetrics,
    #[serde(rename = "teamAverage")]
    pub team_average: PerformanceMetrics,
    /// Number of snapshots in the average (peers plus the agent)
    #[serde(rename = "teamSize")]
    pub team_size: usize,
}

/// Optional call-history filter
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub queue: Option<String>,
    pub direction: Option<CallDirection>,
    pub disposition: Option<CallDisposition>,
}

impl HistoryFilter {
    fn matches(&self, record: &CallRecord) -> bool {
        if let Some(queue) = &self.queue {
            if record.queue.as_deref() != Some(queue.as_str()) {
                return false;
            }
        }
        if let Some(direction) = self.direction {
            if record.direction != direction {
                return false;
            }
        }
        if let Some(disposition) = self.disposition {
            if record.disposition != disposition {
                return false;
            }
        }
        true
    }
}

/// Queue breakdown, optionally narrowed to one queue name.
pub fn queue_stats(stats: &AgentStatistics, queue: Option<&str>) -> Vec<QueueStatsEntry> {
    stats
        .queue_stats
        .iter()
        .filter(|(name, _)| queue.map_or(true, |q| q == name.as_str()))
        .map(|(name, entry)| QueueStatsEntry {
            queue: name.clone(),
            calls_handled: entry.calls_handled,
            talk_time: entry.talk_time,
            avg_talk_time: if entry.calls_handled > 0 {
                entry.talk_time as f64 / entry.calls_handled as f64
            } else {
                0.0
            },
        })
        .collect()
}

/// All 24 hourly buckets, zero-filled for quiet hours.
pub fn hourly_breakdown(stats: &AgentStatistics) -> Vec<HourlyEntry> {
    stats
        .hourly
        .iter()
        .enumerate()
        .map(|(hour, bucket)| HourlyEntry {
            hour: hour as u8,
            calls: bucket.calls,
            talk_time: bucket.talk_time,
        })
        .collect()
}

/// Active hours sorted by call count descending, ties broken by
/// ascending hour index.
pub fn peak_hours(stats: &AgentStatistics, limit: usize) -> Vec<HourlyEntry> {
    let mut hours: Vec<HourlyEntry> = hourly_breakdown(stats)
        .into_iter()
        .filter(|entry| entry.calls > 0)
        .collect();
    hours.sort_by(|a, b| b.calls.cmp(&a.calls).then(a.hour.cmp(&b.hour)));
    hours.truncate(limit);
    hours
}

/// Queues sorted by calls handled descending, ties by name.
pub fn top_queues(stats: &AgentStatistics, limit: usize) -> Vec<QueueStatsEntry> {
    let mut queues = queue_stats(stats, None);
    queues.sort_by(|a, b| b.calls_handled.cmp(&a.calls_handled).then(a.queue.cmp(&b.queue)));
    queues.truncate(limit);
    queues
}

/// Compare the agent against a set of peer snapshots. The team average
/// is the arithmetic mean per KPI over the peers plus the agent.
/// Returns None when no peers are available.
pub fn compare_to_team(
    stats: &AgentStatistics,
    peers: &[AgentStatistics],
) -> Option<TeamComparison> {
    if peers.is_empty() {
        return None;
    }
    let team: Vec<&PerformanceMetrics> = peers
        .iter()
        .map(|p| &p.performance)
        .chain(std::iter::once(&stats.performance))
        .collect();
    Some(TeamComparison {
        agent_id: stats.agent_id.clone(),
        agent: stats.performance.clone(),
        team_average: mean_metrics(&team),
        team_size: team.len(),
    })
}

fn mean_metrics(all: &[&PerformanceMetrics]) -> PerformanceMetrics {
    let n = all.len() as f64;
    let mean = |get: fn(&PerformanceMetrics) -> f64| all.iter().map(|m| get(m)).sum::<f64>() / n;
    PerformanceMetrics {
        calls_per_hour: mean(|m| m.calls_per_hour),
        avg_handle_time: mean(|m| m.avg_handle_time),
        avg_talk_time: mean(|m| m.avg_talk_time),
        avg_wrap_time: mean(|m| m.avg_wrap_time),
        avg_hold_time: mean(|m| m.avg_hold_time),
        first_call_resolution: mean(|m| m.first_call_resolution),
        service_level: mean(|m| m.service_level),
        occupancy: mean(|m| m.occupancy),
        utilization: mean(|m| m.utilization),
        avg_quality_score: mean(|m| m.avg_quality_score),
        transfer_rate: mean(|m| m.transfer_rate),
        hold_rate: mean(|m| m.hold_rate),
    }
}

/// Recent calls, newest first, optionally filtered and truncated.
pub fn call_history(
    stats: &AgentStatistics,
    filter: Option<&HistoryFilter>,
    limit: Option<usize>,
) -> Vec<CallRecord> {
    let records = stats
        .recent_calls
        .iter()
        .filter(|record| filter.map_or(true, |f| f.matches(record)))
        .cloned();
    match limit {
        Some(limit) => records.take(limit).collect(),
        None => records.collect(),
    }
}
