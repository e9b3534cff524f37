use serde::{Deserialize, Serialize};

/// Summary of one decode session, recorded at its terminal transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionTrace {
    /// Id of the assistant message the session produced.
    pub session_id: Option<String>,

    /// Wire format, e.g. "plain", "prefixed", "provider-line".
    pub format: Option<String>,

    /// "completed", "cancelled" or "failed".
    pub outcome: Option<String>,

    /// Raw body bytes read before the terminal state.
    pub bytes: Option<u64>,

    /// Decoded events applied to the draft.
    pub events: Option<u64>,

    /// Snapshots published.
    pub snapshots: Option<u64>,

    /// Elapsed time since the session was created.
    pub latency_ms: Option<u64>,

    /// Optional error metadata, if applicable.
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}

impl SessionTrace {
    pub fn new(session_id: &str, format: &str) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            format: Some(format.to_string()),
            ..Default::default()
        }
    }

    pub fn outcome(mut self, outcome: &str) -> Self {
        self.outcome = Some(outcome.to_string());
        self
    }
    pub fn bytes(mut self, n: u64) -> Self {
        self.bytes = Some(n);
        self
    }
    pub fn events(mut self, n: u64) -> Self {
        self.events = Some(n);
        self
    }
    pub fn snapshots(mut self, n: u64) -> Self {
        self.snapshots = Some(n);
        self
    }
    pub fn latency_ms(mut self, ms: u64) -> Self {
        self.latency_ms = Some(ms);
        self
    }
    pub fn error(mut self, kind: &str, message: &str) -> Self {
        self.error_kind = Some(kind.to_string());
        self.error_message = Some(message.to_string());
        self
    }
}
