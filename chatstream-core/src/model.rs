use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Function,
}

/// A finalized function call requested by the assistant.
///
/// `arguments` is kept as JSON text; the caller decides how to parse it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    #[serde(deserialize_with = "arguments_as_text")]
    pub arguments: String,
}

// Some upstreams send `arguments` as an object rather than a string.
fn arguments_as_text<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(de)?;
    Ok(match v {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Function-call slot of a message: raw text while streaming, structured once terminal.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum FunctionCallSlot {
    Streaming(String),
    Complete(FunctionCall),
}

impl FunctionCallSlot {
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming(_))
    }

    pub fn as_complete(&self) -> Option<&FunctionCall> {
        match self {
            Self::Complete(fc) => Some(fc),
            Self::Streaming(_) => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCallSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_ms: Option<i64>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            role,
            content: content.into(),
            function_call: None,
            name: None,
            created_at_ms: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

pub(crate) fn new_message_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub(crate) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_json_lowercase() {
        let json = r#"{"id":"m1","role":"assistant","content":"ok"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.function_call.is_none());
        let back = serde_json::to_string(&msg).unwrap();
        assert!(back.contains("\"assistant\""));
        assert!(!back.contains("function_call"));
    }

    #[test]
    fn function_call_slot_is_untagged() {
        let streaming = FunctionCallSlot::Streaming("{\"function_call\":".into());
        assert_eq!(
            serde_json::to_value(&streaming).unwrap(),
            serde_json::json!("{\"function_call\":")
        );

        let parsed: FunctionCallSlot =
            serde_json::from_str(r#"{"name":"f","arguments":"{}"}"#).unwrap();
        assert_eq!(
            parsed.as_complete(),
            Some(&FunctionCall {
                name: "f".into(),
                arguments: "{}".into()
            })
        );
    }

    #[test]
    fn object_arguments_are_kept_as_json_text() {
        let fc: FunctionCall =
            serde_json::from_str(r#"{"name":"get_weather","arguments":{"city":"Oslo"}}"#).unwrap();
        assert_eq!(fc.arguments, r#"{"city":"Oslo"}"#);
    }
}
