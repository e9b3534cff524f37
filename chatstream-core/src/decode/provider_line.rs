//! Provider JSON-per-line format: `{"text": ..., "is_finished": ...}`.

use serde::Deserialize;

use super::framer::LineFramer;
use super::FrameDecode;
use crate::error::{ChatStreamError, CoreResult};
use crate::stream::Event;

#[derive(Deserialize)]
struct ProviderLine {
    // end lines omit `text`
    #[serde(default)]
    text: String,
    is_finished: bool,
}

/// Normalizes provider lines into the same cumulative `Text` events the plain
/// front end produces. A finished line is a sentinel and yields nothing.
#[derive(Debug, Default)]
pub struct ProviderLineAdapter {
    framer: LineFramer,
    streamed: String,
}

impl ProviderLineAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one line into its text delta. `None` for the finishing sentinel.
    pub fn parse_line(line: &str) -> CoreResult<Option<String>> {
        let parsed: ProviderLine = serde_json::from_str(line).map_err(|e| {
            ChatStreamError::protocol(format!("malformed provider line {line:?}: {e}"))
        })?;
        if parsed.is_finished {
            Ok(None)
        } else {
            Ok(Some(parsed.text))
        }
    }

    fn handle_line(&mut self, line: &str, emit: &mut dyn FnMut(Event) -> CoreResult<()>) -> CoreResult<()> {
        match Self::parse_line(line)? {
            Some(delta) if !delta.is_empty() => {
                self.streamed.push_str(&delta);
                emit(Event::Text(self.streamed.clone()))
            }
            _ => Ok(()),
        }
    }
}

impl FrameDecode for ProviderLineAdapter {
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
