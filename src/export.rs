//! CSV and JSON export
//!
//! CSV cells are sanitized against spreadsheet formula injection: any
//! value starting with `=`, `+`, `-` or `@` gets a leading single
//! quote before normal RFC 4180 quoting is applied. JSON export is a
//! structural dump of the statistics snapshot.

use crate::error::TrackerResult;
use crate::models::AgentStatistics;

const CSV_HEADER: &str = "Call ID,Queue,Remote Party,Direction,Started At,Answered At,Ended At,Wait Time,Talk Time,Hold Time,Wrap Time,Disposition,Transfer Target,Recorded";

/// Export the recent-call history as CSV, one row per call.
pub fn export_csv(stats: &AgentStatistics) -> String {
    let mut out = String::with_capacity(stats.recent_calls.len() * 128 + CSV_HEADER.len());
    out.push_str(CSV_HEADER);
    out.push('\n');

    for record in &stats.recent_calls {
        let answered = record
            .answered_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        let wait = record
            .wait_time
            .map(|w| w.to_string())
            .unwrap_or_default();
        let cells = [
            record.id.as_str(),
            record.queue.as_deref().unwrap_or(""),
            record.remote_party.as_str(),
            record.direction.as_str(),
            &record.started_at.to_rfc3339(),
            &answered,
            &record.ended_at.to_rfc3339(),
            &wait,
            &record.talk_time.to_string(),
            &record.hold_time.to_string(),
            &record.wrap_time.to_string(),
            record.disposition.as_str(),
            record.transfer_target.as_deref().unwrap_or(""),
            if record.recorded { "yes" } else { "no" },
        ];
        let row: Vec<String> = cells.iter().map(|cell| csv_cell(cell)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Export the full statistics snapshot as pretty JSON.
pub fn export_json(stats: &AgentStatistics) -> TrackerResult<String> {
    Ok(serde_json::to_string_pretty(stats)?)
}

/// Sanitize then quote one CSV cell.
fn csv_cell(value: &str) -> String {
    let sanitized = match value.chars().next() {
        Some('=') | Some('+') | Some('-') | Some('@') => format!("'{}", value),
        _ => value.to_string(),
    };
    if sanitized.chars().any(|c| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", sanitized.replace('"', "\"\""))
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::models::{CallDirection, CallDisposition, CallRecord};
    use chrono::Utc;

    fn record_with_queue(queue: &str) -> CallRecord {
        CallRecord {
            id: "call-1".to_string(),
            queue: Some(queue.to_string()),
            remote_party: "PJSIP/+15551234-0001".to_string(),
            direction: CallDirection::Inbound,
            started_at: Utc::now(),
            answered_at: Some(Utc::now()),
            ended_at: Utc::now(),
            wait_time: Some(5),
            talk_time: 60,
            hold_time: 0,
            wrap_time: 10,
            disposition: CallDisposition::Answered,
            transfer_target: None,
            recorded: true,
        }
    }

    fn stats_with_record(record: CallRecord) -> AgentStatistics {
        let config = TrackerConfig::new("1001");
        let mut stats = AgentStatistics::new("1001", "PJSIP/1001", "Agent");
        stats.record_call(record, &config);
        stats
    }

    #[test]
    fn test_csv_has_header_and_row() {
        let stats = stats_with_record(record_with_queue("support"));
        let csv = export_csv(&stats);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        let row = lines.next().unwrap();
        assert!(row.starts_with("call-1,support,"));
        assert!(row.ends_with(",yes"));
    }

    #[test]
    fn test_csv_defuses_formula_injection() {
        let stats = stats_with_record(record_with_queue("=1+1"));
        let csv = export_csv(&stats);
        assert!(csv.contains("'=1+1"));
        for line in csv.lines() {
            assert!(!line.starts_with('='));
        }
    }

    #[test]
    fn test_csv_sanitizes_every_dangerous_prefix() {
        for prefix in ["=SUM(A1)", "+1", "-1", "@cmd"] {
            let sanitized = csv_cell(prefix);
            assert!(sanitized.starts_with('\''), "unsanitized: {prefix}");
        }
        assert_eq!(csv_cell("safe"), "safe");
    }

    #[test]
    fn test_csv_quotes_commas_and_quotes() {
        assert_eq!(csv_cell("a,b"), "\"a,b\"");
        assert_eq!(csv_cell("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_cell("=a,b"), "\"'=a,b\"");
    }

    #[test]
    fn test_json_is_structural_dump() {
        let stats = stats_with_record(record_with_queue("support"));
        let json = export_json(&stats).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["agentId"], "1001");
        assert_eq!(parsed["totalCalls"], 1);
        assert_eq!(parsed["recentCalls"][0]["id"], "call-1");
        assert_eq!(parsed["queueStats"]["support"]["callsHandled"], 1);
    }
}
