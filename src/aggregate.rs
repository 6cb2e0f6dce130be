//! Incremental aggregation over call records
//!
//! Mutating operations on `AgentStatistics`. Each recorded call does a
//! constant amount of counter work (no rescans of history); the only
//! follow-up cost is the full KPI recompute, which runs against the
//! running totals, not the recent-call ring.

use chrono::{DateTime, Datelike, Days, NaiveTime, Utc};

use crate::config::TrackerConfig;
use crate::metrics;
use crate::models::{
    AgentStatistics, CallDirection, CallDisposition, CallRecord, PerformanceGrade, PeriodKind,
};

impl AgentStatistics {
    /// Record one completed or missed call.
    ///
    /// Returns false when the record's id is already present in the
    /// recent-call ring; duplicate deliveries from the best-effort
    /// feed are dropped rather than double-counted.
    pub fn record_call(&mut self, record: CallRecord, config: &TrackerConfig) -> bool {
        if self.recent_calls.iter().any(|c| c.id == record.id) {
            tracing::debug!("Dropping duplicate call record {}", record.id);
            return false;
        }
        let record = record.normalized();

        self.total_calls += 1;
        match record.direction {
            CallDirection::Inbound => self.inbound_calls += 1,
            CallDirection::Outbound => self.outbound_calls += 1,
            CallDirection::Internal => self.internal_calls += 1,
        }
        match record.disposition {
            CallDisposition::Answered => {}
            CallDisposition::Missed => self.missed_calls += 1,
            CallDisposition::Transferred => self.transferred_calls += 1,
            CallDisposition::Voicemail => self.voicemail_calls += 1,
        }
        if record.disposition.is_connected() {
            self.answered_calls += 1;
        }

        self.total_talk_time += record.talk_time;
        self.total_hold_time += record.hold_time;
        self.total_wrap_time += record.wrap_time;
        self.total_handle_time += record.handle_time();
        self.total_on_call_time += record.talk_time + record.hold_time;

        if let Some(wait) = record.wait_time {
            self.calls_with_wait_data += 1;
            if record.disposition.is_connected() && wait <= config.service_level_threshold_secs {
                self.calls_within_service_level += 1;
            }
        }
        if record.hold_time > 0 {
            self.calls_with_hold += 1;
        }

        let bucket = &mut self.hourly[record.start_hour().min(23)];
        bucket.calls += 1;
        bucket.talk_time += record.talk_time;

        if let Some(queue) = &record.queue {
            let entry = self.queue_stats.entry(queue.clone()).or_default();
            entry.calls_handled += 1;
            entry.talk_time += record.talk_time;
        }

        self.recent_calls.push_front(record);
        self.recent_calls.truncate(config.max_recent_calls);

        self.recompute(config);
        true
    }

    /// Late-arriving wrap time for a call already in the ring.
    /// Unknown ids are a no-op; the totals are adjusted by the delta,
    /// not by re-adding the new value.
    pub fn update_wrap_time(&mut self, call_id: &str, wrap_time: u64, config: &TrackerConfig) -> bool {
        let Some(record) = self.recent_calls.iter_mut().find(|c| c.id == call_id) else {
            return false;
        };
        let old = record.wrap_time;
        record.wrap_time = wrap_time;

        if wrap_time >= old {
            let delta = wrap_time - old;
            self.total_wrap_time += delta;
            self.total_handle_time += delta;
        } else {
            let delta = old - wrap_time;
            self.total_wrap_time = self.total_wrap_time.saturating_sub(delta);
            self.total_handle_time = self.total_handle_time.saturating_sub(delta);
        }

        self.recompute(config);
        true
    }

    /// Add logged-in seconds (occupancy/utilization denominator).
    pub fn add_login_time(&mut self, seconds: u64, config: &TrackerConfig) {
        self.total_login_time += seconds;
        self.recompute(config);
    }

    /// Add available (idle, ready) seconds.
    pub fn add_available_time(&mut self, seconds: u64, config: &TrackerConfig) {
        self.total_available_time += seconds;
        self.recompute(config);
    }

    /// Add paused (break) seconds.
    pub fn add_paused_time(&mut self, seconds: u64, config: &TrackerConfig) {
        self.total_paused_time += seconds;
        self.recompute(config);
    }

    /// Zero every counter, queue entry, hourly bucket and the ring.
    /// Configuration (thresholds, filters, ring capacity) is untouched.
    pub fn reset_counters(&mut self) {
        self.total_calls = 0;
        self.inbound_calls = 0;
        self.outbound_calls = 0;
        self.internal_calls = 0;
        self.missed_calls = 0;
        self.transferred_calls = 0;
        self.voicemail_calls = 0;
        self.total_talk_time = 0;
        self.total_hold_time = 0;
        self.total_wrap_time = 0;
        self.total_handle_time = 0;
        self.total_login_time = 0;
        self.total_available_time = 0;
        self.total_paused_time = 0;
        self.total_on_call_time = 0;
        self.answered_calls = 0;
        self.calls_with_wait_data = 0;
        self.calls_within_service_level = 0;
        self.calls_with_hold = 0;
        self.performance = Default::default();
        self.queue_stats.clear();
        self.hourly = Default::default();
        self.recent_calls.clear();
        self.grade = PerformanceGrade::default();
        self.last_updated = Utc::now();
    }

    /// Switch to a new reporting period and reset the counters.
    /// Custom periods take the supplied bounds verbatim.
    pub fn set_period(
        &mut self,
        kind: PeriodKind,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) {
        let now = Utc::now();
        let (period_start, period_end) = match kind {
            PeriodKind::Custom => (start.unwrap_or(now), end.unwrap_or(now)),
            _ => period_bounds(kind, now),
        };
        self.period = kind;
        self.period_start = period_start;
        self.period_end = period_end;
        self.reset_counters();
    }

    /// Rebuild the derived KPIs and grade from the current totals.
    pub fn recompute(&mut self, config: &TrackerConfig) {
        self.performance = metrics::compute(self);
        self.grade = if self.total_calls == 0 {
            PerformanceGrade::default()
        } else {
            metrics::grade(metrics::overall_score(
                &self.performance,
                &config.grade_policy,
            ))
        };
        self.last_updated = Utc::now();
    }
}

/// Calendar bounds for the non-custom period kinds.
fn period_bounds(kind: PeriodKind, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let day = now.date_naive();
    let (start, end) = match kind {
        PeriodKind::Today | PeriodKind::Custom => (day, day + Days::new(1)),
        PeriodKind::Week => {
            let week_start = day - Days::new(day.weekday().num_days_from_monday() as u64);
            (week_start, week_start + Days::new(7))
        }
        PeriodKind::Month => {
            let month_start = day.with_day(1).unwrap_or(day);
            let next_month = if month_start.month() == 12 {
                month_start
                    .with_year(month_start.year() + 1)
                    .and_then(|d| d.with_month(1))
            } else {
                month_start.with_month(month_start.month() + 1)
            };
            (month_start, next_month.unwrap_or(month_start + Days::new(31)))
        }
    };
    (
        start.and_time(NaiveTime::MIN).and_utc(),
        end.and_time(NaiveTime::MIN).and_utc(),
    )
}
