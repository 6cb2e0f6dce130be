//! Inbound event shapes and normalization
//!
//! The upstream feed delivers AMI-style tagged messages. Two event
//! kinds matter here: `AgentComplete` (a finished, answered queue call)
//! and `AgentRingNoAnswer` (a call the agent did not pick up). Every
//! other event is ignored. Numeric fields arrive as strings or numbers
//! depending on the bridge; parse failures coerce to 0, never to an
//! error.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::TrackerConfig;
use crate::models::{CallDirection, CallDisposition, CallRecord};

/// Raw message from the upstream protocol client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmiMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub data: AmiEventData,
}

/// Payload carrying the upstream field names verbatim
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmiEventData {
    #[serde(rename = "Event")]
    pub event: String,
    #[serde(rename = "Queue", default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    #[serde(rename = "Uniqueid", default, skip_serializing_if = "Option::is_none")]
    pub uniqueid: Option<String>,
    #[serde(rename = "Channel", default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(rename = "Member", default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
    #[serde(rename = "MemberName", default, skip_serializing_if = "Option::is_none")]
    pub member_name: Option<String>,
    #[serde(rename = "Interface", default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(rename = "HoldTime", default, skip_serializing_if = "Option::is_none")]
    pub hold_time: Option<Value>,
    #[serde(rename = "TalkTime", default, skip_serializing_if = "Option::is_none")]
    pub talk_time: Option<Value>,
    #[serde(rename = "RingTime", default, skip_serializing_if = "Option::is_none")]
    pub ring_time: Option<Value>,
    #[serde(rename = "Reason", default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Recognized event kinds, dispatched on the `Event` field
#[derive(Debug, Clone)]
pub enum QueueEvent<'a> {
    /// Queue call completed by the agent
    Completed(&'a AmiEventData),
    /// Offered call the agent did not answer
    NotAnswered(&'a AmiEventData),
    /// Anything else; a pure no-op
    Unrecognized,
}

impl<'a> QueueEvent<'a> {
    pub fn classify(message: &'a AmiMessage) -> Self {
        match message.data.event.as_str() {
            "AgentComplete" => QueueEvent::Completed(&message.data),
            "AgentRingNoAnswer" => QueueEvent::NotAnswered(&message.data),
            _ => QueueEvent::Unrecognized,
        }
    }
}

/// Ceiling on any single duration field: one leap year of seconds.
/// Anything above this is garbage from the bridge, not a real call.
const MAX_EVENT_SECS: u64 = 86_400 * 366;

/// Coerce an upstream duration field to seconds. Strings and numbers
/// are accepted; anything unparseable is 0 and absurd values are
/// clamped so downstream timestamp arithmetic stays in range.
fn coerce_secs(value: Option<&Value>) -> u64 {
    let secs = match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    };
    secs.min(MAX_EVENT_SECS)
}

/// Converts raw upstream messages into zero or one `CallRecord`,
/// applying the queue allow-list and agent interface matching.
#[derive(Debug, Clone)]
pub struct EventNormalizer {
    agent_id: String,
    interface: Option<String>,
    queues: Option<Vec<String>>,
}

impl EventNormalizer {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            agent_id: config.agent_id.clone(),
            interface: config.interface.clone(),
            queues: config.queues.clone(),
        }
    }

    /// Produce a call record for a recognized, matching event.
    /// Returns None for unrecognized events, filtered queues and
    /// other agents' calls.
    pub fn normalize(&self, message: &AmiMessage) -> Option<CallRecord> {
        match QueueEvent::classify(message) {
            QueueEvent::Completed(data) => {
                if !self.accepts(data) {
                    return None;
                }
                let wait = coerce_secs(data.hold_time.as_ref());
                let talk = coerce_secs(data.talk_time.as_ref());
                let ended = Utc::now();
                let answered = ended - Duration::seconds(talk as i64);
                let started = answered - Duration::seconds(wait as i64);
                Some(
                    CallRecord {
                        id: self.record_id(data),
                        queue: data.queue.clone(),
                        remote_party: self.remote_party(data),
                        direction: CallDirection::Inbound,
                        started_at: started,
                        answered_at: Some(answered),
                        ended_at: ended,
                        wait_time: Some(wait),
                        talk_time: talk,
                        hold_time: 0,
                        wrap_time: 0,
                        disposition: CallDisposition::Answered,
                        transfer_target: None,
                        recorded: false,
                    }
                    .normalized(),
                )
            }
            QueueEvent::NotAnswered(data) => {
                if !self.accepts(data) {
                    return None;
                }
                let wait = coerce_secs(data.ring_time.as_ref());
                let ended = Utc::now();
                let started = ended - Duration::seconds(wait as i64);
                Some(
                    CallRecord {
                        id: self.record_id(data),
                        queue: data.queue.clone(),
                        remote_party: self.remote_party(data),
                        direction: CallDirection::Inbound,
                        started_at: started,
                        answered_at: None,
                        ended_at: ended,
                        wait_time: Some(wait),
                        talk_time: 0,
                        hold_time: 0,
                        wrap_time: 0,
                        disposition: CallDisposition::Missed,
                        transfer_target: None,
                        recorded: false,
                    }
                    .normalized(),
                )
            }
            QueueEvent::Unrecognized => None,
        }
    }

    fn accepts(&self, data: &AmiEventData) -> bool {
        self.queue_allowed(data.queue.as_deref()) && self.matches_agent(data)
    }

    fn queue_allowed(&self, queue: Option<&str>) -> bool {
        match (&self.queues, queue) {
            (None, _) => true,
            (Some(allowed), Some(queue)) => allowed.iter().any(|q| q == queue),
            // Allow-list configured but the event has no queue at all
            (Some(_), None) => false,
        }
    }

    /// Substring/equality matching of the event's member or interface
    /// label against the tracked agent, e.g. "PJSIP/1001" matches
    /// agent "1001".
    fn matches_agent(&self, data: &AmiEventData) -> bool {
        let candidates = [
            data.interface.as_deref(),
            data.member.as_deref(),
            data.member_name.as_deref(),
        ];
        candidates.into_iter().flatten().any(|candidate| {
            if let Some(interface) = &self.interface {
                if candidate == interface.as_str() {
                    return true;
                }
            }
            candidate.contains(self.agent_id.as_str())
        })
    }

    fn record_id(&self, data: &AmiEventData) -> String {
        data.uniqueid
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    fn remote_party(&self, data: &AmiEventData) -> String {
        data.channel.clone().unwrap_or_else(|| "unknown".to_string())
    }
}
