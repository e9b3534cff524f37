//! Typed, multiplexed wire format: one `<typeChar>[:]<json>` frame per line.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::framer::LineFramer;
use super::FrameDecode;
use crate::error::{ChatStreamError, CoreResult};
use crate::model::FunctionCall;
use crate::stream::Event;

/// Type characters of the prefixed format.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct FramePrefixes {
    #[serde(default = "default_text")]
    pub text: char,
    #[serde(default = "default_function_call")]
    pub function_call: char,
    #[serde(default = "default_data")]
    pub data: char,
    #[serde(default = "default_error")]
    pub error: char,
    #[serde(default = "default_end")]
    pub end: char,
}

fn default_text() -> char {
    '0'
}
fn default_function_call() -> char {
    '1'
}
fn default_data() -> char {
    '2'
}
fn default_error() -> char {
    '3'
}
fn default_end() -> char {
    '4'
}

impl Default for FramePrefixes {
    fn default() -> Self {
        Self {
            text: default_text(),
            function_call: default_function_call(),
            data: default_data(),
            error: default_error(),
            end: default_end(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Text,
    FunctionCall,
    Data,
    Error,
    End,
}

impl FramePrefixes {
    fn all(&self) -> [(char, FrameKind); 5] {
        [
            (self.text, FrameKind::Text),
            (self.function_call, FrameKind::FunctionCall),
            (self.data, FrameKind::Data),
            (self.error, FrameKind::Error),
            (self.end, FrameKind::End),
        ]
    }

    fn kind_of(&self, c: char) -> Option<FrameKind> {
        self.all().into_iter().find(|(p, _)| *p == c).map(|(_, k)| k)
    }

    /// Prefixes must be distinct and must not collide with the `:` separator.
    pub fn validate(&self) -> CoreResult<()> {
        let all = self.all();
        for (i, (c, _)) in all.iter().enumerate() {
            if *c == ':' || c.is_whitespace() {
                return Err(ChatStreamError::Validation(format!(
                    "invalid frame prefix {c:?}"
                )));
            }
            if all[i + 1..].iter().any(|(other, _)| other == c) {
                return Err(ChatStreamError::Validation(format!(
                    "duplicate frame prefix {c:?}"
                )));
            }
        }
        Ok(())
    }
}

/// Parses prefixed frames, one per complete line, strictly in arrival order.
#[derive(Debug, Default)]
pub struct PrefixedParser {
    prefixes: FramePrefixes,
    framer: LineFramer,
}

impl PrefixedParser {
    pub fn new(prefixes: FramePrefixes) -> Self {
        Self {
            prefixes,
            framer: LineFramer::new(),
        }
    }

    /// Parse one line. Blank lines yield `None`.
    pub fn parse_line(&self, line: &str) -> CoreResult<Option<Event>> {
        let mut chars = line.chars();
        let Some(marker) = chars.next() else {
            return Ok(None);
        };
        let rest = chars.as_str();
        let payload = rest.strip_prefix(':').unwrap_or(rest);

        let kind = self
            .prefixes
            .kind_of(marker)
            .ok_or_else(|| ChatStreamError::protocol(format!("unknown frame type {marker:?}")))?;

        if kind == FrameKind::End {
            return Ok(Some(Event::End));
        }

        let value: Value = serde_json::from_str(payload).map_err(|e| {
            ChatStreamError::protocol(format!("malformed {kind:?} frame payload: {e}"))
        })?;

        let event = match kind {
            FrameKind::Text => match value {
                Value::String(s) => Event::Text(s),
                other => {
                    return Err(ChatStreamError::protocol(format!(
                        "text frame payload must be a string, got {other}"
                    )));
                }
            },
            FrameKind::FunctionCall => match value {
                Value::String(s) => Event::FunctionCallFragment(s),
                other => Event::FunctionCall(structured_function_call(other)?),
            },
            FrameKind::Data => Event::Data(value),
            FrameKind::Error => match value {
                Value::String(s) => Event::Error(s),
                other => Event::Error(other.to_string()),
            },
            FrameKind::End => Event::End,
        };
        Ok(Some(event))
    }

    fn handle_line(&self, line: &str, emit: &mut dyn FnMut(Event) -> CoreResult<()>) -> CoreResult<()> {
        match self.parse_line(line)? {
            Some(ev) => {
                tracing::debug!(frame = ?ev, "prefixed frame");
                emit(ev)
            }
            None => Ok(()),
        }
    }
}

/// Accepts either `{"function_call": {...}}` or a bare `{name, arguments}`.
pub(crate) fn structured_function_call(mut value: Value) -> CoreResult<FunctionCall> {
    let inner = if value.get("function_call").is_some() {
        value["function_call"].take()
    } else {
        value
    };
    serde_json::from_value(inner)
        .map_err(|e| ChatStreamError::protocol(format!("malformed function call: {e}")))
}

impl FrameDecode for PrefixedParser {
    fn feed(&mut self, chunk: &[u8], emit: &mut dyn FnMut(Event) -> CoreResult<()>) -> CoreResult<()> {
        for line in self.framer.feed(chunk) {
            self.handle_line(&line, emit)?;
        }
        Ok(())
    }

    fn finish(&mut self, emit: &mut dyn FnMut(Event) -> CoreResult<()>) -> CoreResult<()> {
        for line in self.framer.flush() {
            self.handle_line(&line, emit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_all;
    use serde_json::json;

    fn letters() -> FramePrefixes {
        FramePrefixes {
            text: 't',
            function_call: 'f',
            data: 'd',
            error: 'e',
            end: 'x',
        }
    }

    #[test]
    fn default_prefixes_with_colon_separator() {
        let p = PrefixedParser::new(FramePrefixes::default());
        assert_eq!(p.parse_line("0:\"hi\"").unwrap(), Some(Event::Text("hi".into())));
        assert_eq!(p.parse_line("2:[1,2]").unwrap(), Some(Event::Data(json!([1, 2]))));
        assert_eq!(p.parse_line("3:\"nope\"").unwrap(), Some(Event::Error("nope".into())));
        assert_eq!(p.parse_line("4").unwrap(), Some(Event::End));
        assert_eq!(p.parse_line("").unwrap(), None);
    }

    #[test]
    fn synthetic_stream_in_order() {
        let mut p = PrefixedParser::new(letters());
        let body = b"t\"hello \"\nt\"hello world\"\nd{\"k\":1}\nx\n";
        let events = decode_all(&mut p, [&body[..]]).unwrap();
        assert_eq!(
            events,
            vec![
                Event::Text("hello ".into()),
                Event::Text("hello world".into()),
                Event::Data(json!({"k": 1})),
                Event::End,
            ]
        );
    }

    #[test]
    fn function_call_frames() {
        let p = PrefixedParser::new(FramePrefixes::default());
        assert_eq!(
            p.parse_line("1:\"{\\\"function_call\\\": {\\\"na\"").unwrap(),
            Some(Event::FunctionCallFragment("{\"function_call\": {\"na".into()))
        );
        let expected = Event::FunctionCall(FunctionCall {
            name: "f".into(),
            arguments: "{}".into(),
        });
        assert_eq!(
            p.parse_line(r#"1:{"function_call":{"name":"f","arguments":"{}"}}"#).unwrap(),
            Some(expected.clone())
        );
        assert_eq!(
            p.parse_line(r#"1:{"name":"f","arguments":"{}"}"#).unwrap(),
            Some(expected)
        );
    }

    #[test]
    fn unknown_type_is_protocol_error() {
        let mut p = PrefixedParser::new(letters());
        let mut seen = Vec::new();
        let err = p
            .feed(b"t\"a\"\nz\"b\"\nt\"c\"\n", &mut |ev| {
                seen.push(ev);
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, ChatStreamError::Protocol(_)));
        // nothing after the bad frame is emitted
        assert_eq!(seen, vec![Event::Text("a".into())]);
    }

    #[test]
    fn malformed_tail_is_reported_at_finish() {
        let mut p = PrefixedParser::new(FramePrefixes::default());
        let mut seen = Vec::new();
        p.feed(b"0:\"ok\"\n0:\"unterminated", &mut |ev| {
            seen.push(ev);
            Ok(())
        })
        .unwrap();
        assert_eq!(seen.len(), 1);
        let err = p.finish(&mut |_| Ok(())).unwrap_err();
        assert!(matches!(err, ChatStreamError::Protocol(_)));
    }

    #[test]
    fn well_formed_tail_is_parsed_at_finish() {
        let mut p = PrefixedParser::new(FramePrefixes::default());
        let events = decode_all(&mut p, [&b"0:\"a\"\n0:\"ab\""[..]]).unwrap();
        assert_eq!(events, vec![Event::Text("a".into()), Event::Text("ab".into())]);
    }

    #[test]
    fn text_payload_must_be_string() {
        let p = PrefixedParser::new(FramePrefixes::default());
        assert!(matches!(
            p.parse_line("0:{\"a\":1}"),
            Err(ChatStreamError::Protocol(_))
        ));
    }

    #[test]
    fn validate_rejects_duplicates_and_separator() {
        assert!(FramePrefixes::default().validate().is_ok());
        let dup = FramePrefixes {
            data: '0',
            ..FramePrefixes::default()
        };
        assert!(matches!(dup.validate(), Err(ChatStreamError::Validation(_))));
        let colon = FramePrefixes {
            end: ':',
            ..FramePrefixes::default()
        };
        assert!(matches!(colon.validate(), Err(ChatStreamError::Validation(_))));
    }
}
