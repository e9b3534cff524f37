use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::decode::{FramePrefixes, WireFormat};
use crate::error::{ChatStreamError, CoreResult};
use crate::session::SessionOptions;

fn default_mode_header() -> String {
    "x-experimental-stream-data".to_string()
}
fn default_true() -> bool {
    true
}
fn default_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StreamCfg {
    /// Response header whose value `true` selects the prefixed format.
    #[serde(default = "default_mode_header")]
    pub mode_header: String,
    /// Format used when neither the caller nor the response picks one.
    #[serde(default)]
    pub default_format: WireFormat,
}

impl Default for StreamCfg {
    fn default() -> Self {
        Self {
            mode_header: default_mode_header(),
            default_format: WireFormat::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionCfg {
    /// Keep already-published partial content when a session fails mid-stream.
    /// A failure before the first snapshot always rolls back.
    #[serde(default = "default_true")]
    pub retain_partial_on_error: bool,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            retain_partial_on_error: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingCfg {
    /// `tracing-subscriber` env-filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingCfg {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub stream: StreamCfg,
    #[serde(default)]
    pub prefixes: FramePrefixes,
    #[serde(default)]
    pub session: SessionCfg,
    #[serde(default)]
    pub logging: LoggingCfg,
}

impl Config {
    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(ChatStreamError::from)?;
        let s = std::str::from_utf8(&bytes).map_err(|e| ChatStreamError::Other(e.into()))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                serde_json::from_str::<Self>(s).map_err(|e| ChatStreamError::Other(e.into()))?
            }
            Some("toml") => {
                toml::from_str::<Self>(s).map_err(|e| ChatStreamError::Other(e.into()))?
            }
            _ => serde_json::from_str::<Self>(s)
                .map_err(|e| ChatStreamError::Other(e.into()))
                .or_else(|_| {
                    toml::from_str::<Self>(s).map_err(|e| ChatStreamError::Other(e.into()))
                })?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.stream.mode_header.trim().is_empty() {
            return Err(ChatStreamError::Validation(
                "stream.mode_header must not be empty".into(),
            ));
        }
        http::HeaderName::from_bytes(self.stream.mode_header.as_bytes()).map_err(|e| {
            ChatStreamError::Validation(format!(
                "invalid stream.mode_header '{}': {e}",
                self.stream.mode_header
            ))
        })?;
        self.prefixes.validate()
    }

    /// Session options carrying this config's prefixes; format left to the caller
    /// or the response.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            prefixes: Some(self.prefixes),
            ..Default::default()
        }
    }
}
