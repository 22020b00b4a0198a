//! Call status, options and session snapshots
//!
//! A [`CallSession`] describes the one outbound call the engine is tracking.
//! It is created when the gateway accepts an initiation request and discarded
//! on the first terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a call session
pub type CallId = Uuid;

/// Lifecycle status of an outbound call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    /// No call
    Idle,
    /// Gateway accepted the request
    Initiated,
    /// Media bridge and carrier leg are being set up
    Connecting,
    /// Destination handset is ringing
    Ringing,
    /// Both parties connected
    Answered,
    /// Reserved; the gateway exposes no hold control
    OnHold,
    /// Hung up normally
    Ended,
    /// Setup or the call itself failed
    Failed,
    /// Destination busy
    Busy,
    /// Destination did not pick up
    NoAnswer,
}

impl CallStatus {
    /// Terminal statuses end the session; nothing follows them
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallStatus::Ended | CallStatus::Failed | CallStatus::Busy | CallStatus::NoAnswer
        )
    }

    /// Whether both parties are connected
    pub fn is_connected(&self) -> bool {
        matches!(self, CallStatus::Answered | CallStatus::OnHold)
    }

    fn progress_rank(&self) -> u8 {
        match self {
            CallStatus::Idle => 0,
            CallStatus::Initiated => 1,
            CallStatus::Connecting => 2,
            CallStatus::Ringing => 3,
            CallStatus::Answered => 4,
            CallStatus::OnHold => 5,
            CallStatus::Ended | CallStatus::Failed | CallStatus::Busy | CallStatus::NoAnswer => 6,
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    ///
    /// Progress only moves forward, except for the answered/on-hold toggle.
    /// Any non-terminal status may jump straight to a terminal one, and
    /// terminal statuses accept nothing.
    pub fn can_transition_to(&self, next: CallStatus) -> bool {
        if self.is_terminal() || *self == next {
            return false;
        }
        if next.is_terminal() {
            return true;
        }
        match (self, next) {
            (CallStatus::OnHold, CallStatus::Answered) => true,
            _ => next.progress_rank() > self.progress_rank(),
        }
    }

    /// Map a gateway vendor status string onto the call lifecycle
    ///
    /// Matching ignores case and surrounding whitespace. Unrecognized values
    /// yield `None`.
    ///
    /// ```rust
    /// use telecrm_call_core::CallStatus;
    ///
    /// assert_eq!(CallStatus::from_gateway("in-progress"), Some(CallStatus::Answered));
    /// assert_eq!(CallStatus::from_gateway("NO-ANSWER"), Some(CallStatus::NoAnswer));
    /// assert_eq!(CallStatus::from_gateway("transferring"), None);
    /// ```
    pub fn from_gateway(raw: &str) -> Option<Self> {
        let status = match raw.trim().to_ascii_lowercase().as_str() {
            "queued" | "initiated" => CallStatus::Connecting,
            "ringing" => CallStatus::Ringing,
            "answered" | "in-progress" => CallStatus::Answered,
            "completed" => CallStatus::Ended,
            "failed" | "canceled" => CallStatus::Failed,
            "busy" => CallStatus::Busy,
            "no-answer" => CallStatus::NoAnswer,
            _ => return None,
        };
        Some(status)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Idle => "idle",
            CallStatus::Initiated => "initiated",
            CallStatus::Connecting => "connecting",
            CallStatus::Ringing => "ringing",
            CallStatus::Answered => "answered",
            CallStatus::OnHold => "on-hold",
            CallStatus::Ended => "ended",
            CallStatus::Failed => "failed",
            CallStatus::Busy => "busy",
            CallStatus::NoAnswer => "no-answer",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for placing an outbound call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOptions {
    /// Destination phone number
    pub to: String,
    /// Caller id override; the engine default is used when absent
    pub from: Option<String>,
    /// Opaque correlation data passed through to the gateway
    pub custom_field: Option<String>,
}

impl CallOptions {
    pub fn new(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            ..Default::default()
        }
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_custom_field(mut self, custom_field: impl Into<String>) -> Self {
        self.custom_field = Some(custom_field.into());
        self
    }
}

/// Snapshot of the call the engine is tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSession {
    /// Engine-assigned session id
    pub id: CallId,
    /// Identifier the gateway uses for this call
    pub gateway_call_id: String,
    pub to: String,
    pub from: Option<String>,
    /// Media bridge endpoint returned by the gateway, if any
    pub bridge_endpoint: Option<String>,
    pub custom_field: Option<String>,
    pub status: CallStatus,
    pub created_at: DateTime<Utc>,
    /// Wall-clock time of the first answered status
    pub answered_at: Option<DateTime<Utc>>,
}

impl CallSession {
    pub(crate) fn new(
        id: CallId,
        gateway_call_id: String,
        options: &CallOptions,
        bridge_endpoint: Option<String>,
    ) -> Self {
        Self {
            id,
            gateway_call_id,
            to: options.to.clone(),
            from: options.from.clone(),
            bridge_endpoint,
            custom_field: options.custom_field.clone(),
            status: CallStatus::Initiated,
            created_at: Utc::now(),
            answered_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [CallStatus; 10] = [
        CallStatus::Idle,
        CallStatus::Initiated,
        CallStatus::Connecting,
        CallStatus::Ringing,
        CallStatus::Answered,
        CallStatus::OnHold,
        CallStatus::Ended,
        CallStatus::Failed,
        CallStatus::Busy,
        CallStatus::NoAnswer,
    ];

    #[test]
    fn test_terminal_statuses_accept_nothing() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_any_live_status_can_end() {
        for from in ALL.iter().filter(|s| !s.is_terminal()) {
            for to in ALL.iter().filter(|s| s.is_terminal()) {
                assert!(from.can_transition_to(*to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_progress_never_regresses() {
        assert!(CallStatus::Connecting.can_transition_to(CallStatus::Ringing));
        assert!(CallStatus::Connecting.can_transition_to(CallStatus::Answered));
        assert!(!CallStatus::Ringing.can_transition_to(CallStatus::Connecting));
        assert!(!CallStatus::Answered.can_transition_to(CallStatus::Ringing));
        assert!(CallStatus::Answered.can_transition_to(CallStatus::OnHold));
        assert!(CallStatus::OnHold.can_transition_to(CallStatus::Answered));
        assert!(!CallStatus::Answered.can_transition_to(CallStatus::Answered));
    }

    #[test]
    fn test_vendor_status_mapping() {
        let cases = [
            ("queued", Some(CallStatus::Connecting)),
            ("initiated", Some(CallStatus::Connecting)),
            ("ringing", Some(CallStatus::Ringing)),
            ("answered", Some(CallStatus::Answered)),
            (" In-Progress ", Some(CallStatus::Answered)),
            ("completed", Some(CallStatus::Ended)),
            ("failed", Some(CallStatus::Failed)),
            ("canceled", Some(CallStatus::Failed)),
            ("busy", Some(CallStatus::Busy)),
            ("no-answer", Some(CallStatus::NoAnswer)),
            ("", None),
            ("hold", None),
        ];
        for (raw, expected) in cases {
            assert_eq!(CallStatus::from_gateway(raw), expected, "{raw:?}");
        }
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        assert_eq!(serde_json::to_string(&CallStatus::NoAnswer).unwrap(), "\"no-answer\"");
        assert_eq!(serde_json::to_string(&CallStatus::OnHold).unwrap(), "\"on-hold\"");
    }
}
