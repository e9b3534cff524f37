//! Front ends turning raw body bytes into `Event`s.
//!
//! All three wire formats converge on the same event shape, so the session and
//! reducer never look at which one is active.

pub mod framer;
pub mod plain;
pub mod prefixed;
pub mod provider_line;
pub mod utf8;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChatStreamError, CoreResult};
use crate::stream::Event;

pub use framer::LineFramer;
pub use plain::{ChunkDecoder, PlainText};
pub use prefixed::{FramePrefixes, PrefixedParser};
pub use provider_line::ProviderLineAdapter;
pub use utf8::Utf8Decoder;

/// Which wire format a response body uses.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WireFormat {
    /// The whole body is literal text (or a JSON function call).
    #[default]
    Plain,
    /// Newline-delimited `<typeChar><json>` frames.
    Prefixed,
    /// Newline-delimited `{"text": ..., "is_finished": ...}` objects.
    ProviderLine,
}

impl WireFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Prefixed => "prefixed",
            Self::ProviderLine => "provider-line",
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WireFormat {
    type Err = ChatStreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" => Ok(Self::Plain),
            "prefixed" | "complex" => Ok(Self::Prefixed),
            "provider-line" | "provider_line" | "lines" => Ok(Self::ProviderLine),
            other => Err(ChatStreamError::Validation(format!(
                "unknown wire format '{other}'"
            ))),
        }
    }
}

/// A front end for one wire format.
///
/// `emit` is called once per decoded event, in arrival order. An error returned
/// by `emit` (or by decoding) stops processing of the remaining lines.
pub trait FrameDecode: Send {
    fn feed(&mut self, chunk: &[u8], emit: &mut dyn FnMut(Event) -> CoreResult<()>) -> CoreResult<()>;

    /// End of input: drain whatever is still buffered.
    fn finish(&mut self, emit: &mut dyn FnMut(Event) -> CoreResult<()>) -> CoreResult<()>;
}

/// Build the front end for `format`.
pub fn decoder_for(format: WireFormat, prefixes: FramePrefixes) -> Box<dyn FrameDecode> {
    match format {
        WireFormat::Plain => Box::new(PlainText::new()),
        WireFormat::Prefixed => Box::new(PrefixedParser::new(prefixes)),
        WireFormat::ProviderLine => Box::new(ProviderLineAdapter::new()),
    }
}

/// Feed every chunk then finish, collecting the events.
pub fn decode_all<'a, D, I>(decoder: &mut D, chunks: I) -> CoreResult<Vec<Event>>
where
    D: FrameDecode + ?Sized,
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut events = Vec::new();
    let mut push = |ev: Event| -> CoreResult<()> {
        events.push(ev);
        Ok(())
    };
    for chunk in chunks {
        decoder.feed(chunk, &mut push)?;
    }
    decoder.finish(&mut push)?;
    Ok(events)
}
