//! Derived metric computation and grading
//!
//! Pure functions over the running totals. Nothing here mutates state
//! or allocates beyond the returned struct, and every division guards
//! the zero-denominator case by returning 0.

use crate::config::GradePolicy;
use crate::models::{AgentStatistics, PerformanceGrade, PerformanceMetrics};

fn ratio(numerator: u64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator as f64 / denominator
    } else {
        0.0
    }
}

fn pct(numerator: u64, denominator: u64) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64 * 100.0
    } else {
        0.0
    }
}

/// Recompute the full KPI set from the current totals.
///
/// The quality score is owned by an external scoring engine, so it is
/// carried through from the previous metrics rather than derived here.
pub fn compute(stats: &AgentStatistics) -> PerformanceMetrics {
    let login_hours = stats.total_login_time as f64 / 3600.0;
    let answered = stats.answered_calls;

    let avg_talk_time = ratio(stats.total_talk_time, answered as f64);
    let avg_hold_time = ratio(stats.total_hold_time, answered as f64);
    let avg_wrap_time = ratio(stats.total_wrap_time, answered as f64);

    let resolved_first_call = answered.saturating_sub(stats.transferred_calls);

    PerformanceMetrics {
        calls_per_hour: ratio(stats.total_calls, login_hours),
        avg_talk_time,
        avg_hold_time,
        avg_wrap_time,
        avg_handle_time: avg_talk_time + avg_hold_time + avg_wrap_time,
        first_call_resolution: pct(resolved_first_call, answered),
        service_level: pct(stats.calls_within_service_level, stats.calls_with_wait_data),
        occupancy: pct(stats.total_talk_time, stats.total_login_time),
        utilization: pct(
            stats.total_talk_time + stats.total_wrap_time,
            stats.total_login_time,
        ),
        avg_quality_score: stats.performance.avg_quality_score,
        transfer_rate: pct(stats.transferred_calls, stats.total_calls),
        hold_rate: pct(stats.calls_with_hold, stats.total_calls),
    }
}

/// Overall performance score per the configured grade policy.
pub fn overall_score(metrics: &PerformanceMetrics, policy: &GradePolicy) -> f64 {
    let weight_sum =
        policy.service_level_weight + policy.occupancy_weight + policy.handle_time_weight;
    if weight_sum <= 0.0 {
        return 0.0;
    }

    let handle_penalty = if policy.target_handle_time_secs == 0 {
        0.0
    } else {
        let target = policy.target_handle_time_secs as f64;
        ((metrics.avg_handle_time - target) / target * 100.0).clamp(0.0, 100.0)
    };

    (metrics.service_level * policy.service_level_weight
        + metrics.occupancy.min(100.0) * policy.occupancy_weight
        + (100.0 - handle_penalty) * policy.handle_time_weight)
        / weight_sum
}

/// Map an overall score onto its grade band.
pub fn grade(score: f64) -> PerformanceGrade {
    if score >= 90.0 {
        PerformanceGrade::Excellent
    } else if score >= 75.0 {
        PerformanceGrade::Good
    } else if score >= 60.0 {
        PerformanceGrade::Average
    } else if score >= 40.0 {
        PerformanceGrade::NeedsImprovement
    } else {
        PerformanceGrade::Critical
    }
}
