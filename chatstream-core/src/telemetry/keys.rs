/// Span/Log attribute keys for decode sessions.
/// Keep these stable; changing them is a breaking change for dashboards.
pub const KEY_SESSION_ID: &str = "session.id";
pub const KEY_STREAM_FORMAT: &str = "stream.format";
pub const KEY_SESSION_OUTCOME: &str = "session.outcome";

pub const KEY_STREAM_BYTES: &str = "stream.bytes";
pub const KEY_STREAM_EVENTS: &str = "stream.events";

/// Error-related (if applicable)
pub const KEY_ERROR_KIND: &str = "error.kind";
pub const KEY_ERROR_MESSAGE: &str = "error.message";
