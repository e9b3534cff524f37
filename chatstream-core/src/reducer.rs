//! Folds decoded events into the in-progress assistant message.

use serde_json::Value;

use crate::decode::prefixed::structured_function_call;
use crate::error::{ChatStreamError, CoreResult};
use crate::model::{FunctionCallSlot, Message, Role, new_message_id, now_ms};
use crate::stream::Event;

/// Text starting with this literal is routed to the function-call slot.
///
/// A genuine text reply starting with the same literal is misrouted; kept for
/// wire compatibility.
pub const FUNCTION_CALL_PREFIX: &str = "{\"function_call\":";

/// The assistant message being assembled during one session.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    pub id: String,
    pub created_at_ms: i64,
    pub content: String,
    pub function_call: Option<FunctionCallSlot>,
}

impl MessageDraft {
    pub fn new() -> Self {
        Self {
            id: new_message_id(),
            created_at_ms: now_ms(),
            content: String::new(),
            function_call: None,
        }
    }

    pub fn to_message(&self) -> Message {
        Message {
            id: self.id.clone(),
            role: Role::Assistant,
            content: self.content.clone(),
            function_call: self.function_call.clone(),
            name: None,
            created_at_ms: Some(self.created_at_ms),
        }
    }

    fn accepts_function_call_text(&self) -> bool {
        matches!(self.function_call, None | Some(FunctionCallSlot::Streaming(_)))
    }
}

impl Default for MessageDraft {
    fn default() -> Self {
        Self::new()
    }
}

/// Out-of-band payloads collected across a session. Append-only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataAccumulator {
    items: Vec<Value>,
}

impl DataAccumulator {
    /// Arrays are appended element-wise, anything else as a single item.
    pub fn append(&mut self, payload: Value) {
        match payload {
            Value::Array(items) => self.items.extend(items),
            other => self.items.push(other),
        }
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }
}

/// What applying an event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Draft,
    Data,
    End,
}

#[derive(Debug, Default)]
pub struct StreamReducer {
    draft: MessageDraft,
    data: DataAccumulator,
}

impl StreamReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: Event) -> CoreResult<Applied> {
        match event {
            Event::Text(text) => {
                if self.draft.accepts_function_call_text() && text.starts_with(FUNCTION_CALL_PREFIX) {
                    self.draft.function_call = Some(FunctionCallSlot::Streaming(text));
                } else {
                    self.draft.content = text;
                }
                Ok(Applied::Draft)
            }
            Event::FunctionCallFragment(raw) => {
                self.draft.function_call = Some(FunctionCallSlot::Streaming(raw));
                Ok(Applied::Draft)
            }
            Event::FunctionCall(fc) => {
                self.draft.function_call = Some(FunctionCallSlot::Complete(fc));
                Ok(Applied::Draft)
            }
            Event::Data(payload) => {
                self.data.append(payload);
                Ok(Applied::Data)
            }
            Event::Error(message) => Err(ChatStreamError::Upstream {
                status: None,
                message,
            }),
            Event::End => Ok(Applied::End),
        }
    }

    /// Natural completion: a still-raw function call is parsed into its
    /// structured form. Returns whether the draft changed.
    pub fn finish(&mut self) -> CoreResult<bool> {
        let Some(FunctionCallSlot::Streaming(raw)) = &self.draft.function_call else {
            return Ok(false);
        };
        let value: Value = serde_json::from_str(raw).map_err(|e| {
            ChatStreamError::protocol(format!("malformed function call payload: {e}"))
        })?;
        let fc = structured_function_call(value)?;
        self.draft.function_call = Some(FunctionCallSlot::Complete(fc));
        Ok(true)
    }

    pub fn draft(&self) -> &MessageDraft {
        &self.draft
    }

    pub fn data(&self) -> &DataAccumulator {
        &self.data
    }
}
