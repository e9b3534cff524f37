use thiserror::Error;

/// Core error type for chatstream.
/// Internally, modules can use `anyhow::Result<T>` for convenience,
/// but public boundaries should expose `CoreResult<T>` with this error.
///
/// Cancellation is deliberately absent: a stopped session is a terminal state,
/// not a failure (see `session::SessionState::Cancelled`).
#[derive(Debug, Error)]
pub enum ChatStreamError {
    /// Network or IO failure while reading the response body.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed frame or line, unknown type marker, or a malformed terminal
    /// function-call payload.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Non-success response status or an explicit error frame from upstream.
    #[error("upstream error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChatStreamError {
    /// Stable short name used for telemetry and span attributes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Protocol(_) => "protocol",
            Self::Upstream { .. } => "upstream",
            Self::Validation(_) => "validation",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }

    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

pub type CoreResult<T> = std::result::Result<T, ChatStreamError>;
