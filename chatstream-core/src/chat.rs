//! Conversation state fed by decode sessions.
//!
//! `ChatState` owns the message list a UI would render. A session is started with
//! an optimistic update (`begin`), folded in event by event (`apply`), and either
//! committed or rolled back on its terminal event. Sessions sharing one `ChatState`
//! must run one at a time; `&mut self` enforces it.

use serde_json::Value;

use crate::config::SessionCfg;
use crate::error::ChatStreamError;
use crate::model::{Message, Role, new_message_id};
use crate::session::{Session, SessionOptions};
use crate::stream::SessionEvent;

/// How a driven session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    Completed(Message),
    Cancelled(Message),
    Failed(ChatStreamError),
}

impl SessionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone)]
struct RollbackPoint {
    messages: Vec<Message>,
    data: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct ChatState {
    messages: Vec<Message>,
    data: Vec<Value>,
    error: Option<String>,
    is_loading: bool,
    retain_partial_on_error: bool,
    rollback: Option<RollbackPoint>,
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new(&SessionCfg::default())
    }
}

impl ChatState {
    pub fn new(cfg: &SessionCfg) -> Self {
        Self {
            messages: Vec::new(),
            data: Vec::new(),
            error: None,
            is_loading: false,
            retain_partial_on_error: cfg.retain_partial_on_error,
            rollback: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn data(&self) -> &[Value] {
        &self.data
    }

    /// Rendered error of the last failed session, cleared by `begin`.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Replace the conversation outright (e.g. restoring history).
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// The request list for sending `message`: the current conversation plus it.
    pub fn append(&self, mut message: Message) -> Vec<Message> {
        if message.id.is_empty() {
            message.id = new_message_id();
        }
        let mut request = self.messages.clone();
        request.push(message);
        request
    }

    /// The request list for regenerating the last reply, or `None` when there is
    /// nothing to resend.
    pub fn reload(&self) -> Option<Vec<Message>> {
        let last = self.messages.last()?;
        let mut request = self.messages.clone();
        if last.role == Role::Assistant {
            request.pop();
        }
        Some(request)
    }

    /// Optimistically show `request` and remember what to restore on failure.
    pub fn begin(&mut self, request: Vec<Message>) {
        self.rollback = Some(RollbackPoint {
            messages: std::mem::replace(&mut self.messages, request),
            data: self.data.clone(),
        });
        self.error = None;
        self.is_loading = true;
    }

    /// Options for a session continuing this conversation.
    pub fn session_options(&self, base: SessionOptions) -> SessionOptions {
        base.prior_messages(self.messages.clone())
            .prior_data(self.data.clone())
    }

    pub fn apply(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Snapshot(snapshot) => {
                self.messages = snapshot.messages.clone();
                self.data = snapshot.data.clone();
            }
            SessionEvent::Finished { message, data } | SessionEvent::Cancelled { message, data } => {
                self.commit(message, data);
            }
            SessionEvent::Failed { error, published } => {
                self.error = Some(error.to_string());
                let rollback = self.rollback.take();
                if *published && self.retain_partial_on_error {
                    tracing::debug!(error = %error, "keeping partial reply after failure");
                } else if let Some(point) = rollback {
                    tracing::debug!(error = %error, published, "rolling back chat state");
                    self.messages = point.messages;
                    self.data = point.data;
                }
                self.is_loading = false;
            }
        }
    }

    fn commit(&mut self, message: &Message, session_data: &[Value]) {
        let base_data = self
            .rollback
            .take()
            .map(|p| p.data)
            .unwrap_or_else(|| self.data.clone());
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message.clone(),
            None if !message.content.is_empty() || message.function_call.is_some() => {
                self.messages.push(message.clone());
            }
            None => {}
        }
        self.data = base_data;
        self.data.extend_from_slice(session_data);
        self.is_loading = false;
    }

    /// Run `session` to its end, applying every event.
    pub async fn drive(&mut self, mut session: Session) -> SessionOutcome {
        while let Some(event) = session.next_event().await {
            self.apply(&event);
            match event {
                SessionEvent::Snapshot(_) => {}
                SessionEvent::Finished { message, .. } => return SessionOutcome::Completed(message),
                SessionEvent::Cancelled { message, .. } => return SessionOutcome::Cancelled(message),
                SessionEvent::Failed { error, .. } => return SessionOutcome::Failed(error),
            }
        }
        self.is_loading = false;
        SessionOutcome::Failed(ChatStreamError::Other(anyhow::anyhow!(
            "session ended without a terminal event"
        )))
    }
}
