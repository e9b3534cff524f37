//! Event types flowing through a decode session.
//!
//! Contract:
//! - Front ends produce `Event`s in stream order. `Text` and `FunctionCallFragment`
//!   carry the *cumulative* value so far; each one replaces the previous draft value.
//! - A session publishes 0..n `SessionEvent::Snapshot`s followed by exactly one
//!   terminal event: `Finished`, `Cancelled`, or `Failed`.
//! - After a terminal event, no further events are emitted.
//!
//! `SessionEvent` does not derive `Clone` / `PartialEq` because `Failed` contains
//! `ChatStreamError`, which is not (and should not be) `Clone` or `Eq`.

use crate::error::ChatStreamError;
use crate::model::{FunctionCall, Message};

/// A decoded, semantic unit of the upstream stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Cumulative assistant text.
    Text(String),
    /// Cumulative raw function-call text, still streaming.
    FunctionCallFragment(String),
    /// Already-structured function call.
    FunctionCall(FunctionCall),
    /// Out-of-band JSON payload.
    Data(serde_json::Value),
    /// Explicit error frame from upstream; fatal to the session.
    Error(String),
    /// Explicit end-of-stream marker.
    End,
}

impl Event {
    /// Returns true if this event ends the session (`End` or `Error`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End | Self::Error(_))
    }

    /// Convenience accessor for `Text` contents.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// `[...prior_messages, draft]` and `[...prior_data, ...data]` at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub messages: Vec<Message>,
    pub data: Vec<serde_json::Value>,
}

impl Snapshot {
    /// The in-progress assistant message (always last).
    pub fn draft(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// What the caller receives incrementally from a session.
#[non_exhaustive]
#[derive(Debug)]
pub enum SessionEvent {
    /// Optimistic intermediate state.
    Snapshot(Snapshot),
    /// Natural completion; the finalized message and this session's data payloads.
    Finished {
        message: Message,
        data: Vec<serde_json::Value>,
    },
    /// Stopped by the caller; partial content is kept.
    Cancelled {
        message: Message,
        data: Vec<serde_json::Value>,
    },
    /// Fatal error. `published` tells whether any snapshot went out before it.
    Failed {
        error: ChatStreamError,
        published: bool,
    },
}

impl SessionEvent {
    /// Returns true if this event terminates the session.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Snapshot(_))
    }

    pub fn as_snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::Snapshot(s) => Some(s),
            _ => None,
        }
    }
}

/// Boxed stream of session events.
pub type BoxSessionStream = futures::stream::BoxStream<'static, SessionEvent>;
