use serde::{Deserialize, Serialize};
use chrono::{DateTime, Local, Timelike, Utc};

/// One completed or missed call handled by (or offered to) the tracked agent.
///
/// Immutable once recorded except `wrap_time`, which may be updated late
/// via the dedicated wrap-time operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallRecord {
    pub id: String,
    pub queue: Option<String>,
    #[serde(rename = "remoteParty")]
    pub remote_party: String,
    pub direction: CallDirection,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "answeredAt")]
    pub answered_at: Option<DateTime<Utc>>,
    #[serde(rename = "endedAt")]
    pub ended_at: DateTime<Utc>,
    /// Seconds the caller waited before the call was answered or abandoned.
    /// None when the upstream feed carried no wait data.
    #[serde(rename = "waitTime")]
    pub wait_time: Option<u64>,
    #[serde(rename = "talkTime")]
    pub talk_time: u64,
    #[serde(rename = "holdTime")]
    pub hold_time: u64,
    #[serde(rename = "wrapTime")]
    pub wrap_time: u64,
    pub disposition: CallDisposition,
    #[serde(rename = "transferTarget")]
    pub transfer_target: Option<String>,
    pub recorded: bool,
}

impl CallRecord {
    /// Enforce the record invariant: talk time only counts when the call
    /// actually connected.
    pub fn normalized(mut self) -> Self {
        if !self.disposition.is_connected() {
            self.talk_time = 0;
        }
        self
    }

    /// Local hour-of-day bucket (0-23) for the call's start.
    pub fn start_hour(&self) -> usize {
        self.started_at.with_timezone(&Local).hour() as usize
    }

    /// Total handle contribution: talk + hold + wrap.
    pub fn handle_time(&self) -> u64 {
        self.talk_time + self.hold_time + self.wrap_time
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
    Internal,
}

impl CallDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallDirection::Inbound => "inbound",
            CallDirection::Outbound => "outbound",
            CallDirection::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CallDisposition {
    Answered,
    Missed,
    Transferred,
    Voicemail,
}

impl CallDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallDisposition::Answered => "answered",
            CallDisposition::Missed => "missed",
            CallDisposition::Transferred => "transferred",
            CallDisposition::Voicemail => "voicemail",
        }
    }

    /// Whether the agent actually spoke on this call.
    pub fn is_connected(&self) -> bool {
        matches!(self, CallDisposition::Answered | CallDisposition::Transferred)
    }
}
