//! Plain wire format: the whole body is the assistant's literal text.

use super::utf8::Utf8Decoder;
use super::FrameDecode;
use crate::error::CoreResult;
use crate::stream::Event;

/// Byte-to-text decoder for un-typed bodies. Does not split into lines.
///
/// Whether the accumulated text is really a JSON function call is decided by
/// the reducer, not here.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    utf8: Utf8Decoder,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.utf8.decode(chunk)
    }

    pub fn finish(&mut self) -> String {
        self.utf8.finish()
    }
}

/// Plain front end: turns each chunk's delta into a cumulative `Text` event.
#[derive(Debug, Default)]
pub struct PlainText {
    decoder: ChunkDecoder,
    streamed: String,
}

impl PlainText {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, delta: String, emit: &mut dyn FnMut(Event) -> CoreResult<()>) -> CoreResult<()> {
        if delta.is_empty() {
            return Ok(());
        }
        self.streamed.push_str(&delta);
        emit(Event::Text(self.streamed.clone()))
    }
}

impl FrameDecode for PlainText {
    fn feed(&mut self, chunk: &[u8], emit: &mut dyn FnMut(Event) -> CoreResult<()>) -> CoreResult<()> {
        let delta = self.decoder.decode(chunk);
        self.push(delta, emit)
    }

    fn finish(&mut self, emit: &mut dyn FnMut(Event) -> CoreResult<()>) -> CoreResult<()> {
        let delta = self.decoder.finish();
        self.push(delta, emit)
    }
}
