//! Intake of an HTTP chat response: status check, wire-format selection, and the
//! body as a `ChunkReader`.

use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;

use crate::config::{Config, StreamCfg};
use crate::decode::WireFormat;
use crate::error::{ChatStreamError, CoreResult};
use crate::session::{ChunkReader, Session, SessionOptions};

const FETCH_FAILED: &str = "Failed to fetch the chat response.";

#[async_trait]
impl ChunkReader for reqwest::Response {
    async fn read(&mut self) -> CoreResult<Option<Bytes>> {
        self.chunk()
            .await
            .map_err(|e| ChatStreamError::Transport(e.to_string()))
    }
}

/// Prefixed when the mode header says `true`, the configured default otherwise.
pub fn detect_format(headers: &HeaderMap, cfg: &StreamCfg) -> WireFormat {
    match headers
        .get(cfg.mode_header.as_str())
        .and_then(|v| v.to_str().ok())
    {
        Some(v) if v.trim().eq_ignore_ascii_case("true") => WireFormat::Prefixed,
        _ => cfg.default_format,
    }
}

impl Session {
    /// Start a session over a response body.
    ///
    /// A non-success status yields an already-failed session carrying the status
    /// and (truncated) body. An explicit `options.format` wins over the headers,
    /// explicit `options.prefixes` over the configured ones.
    pub async fn from_response(
        resp: reqwest::Response,
        mut options: SessionOptions,
        cfg: &Config,
    ) -> Session {
        let status = resp.status();
        if let Some(id) = extract_request_id(resp.headers()) {
            tracing::debug!(upstream_request_id = %id, status = status.as_u16(), "chat response");
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                FETCH_FAILED.to_string()
            } else {
                truncate(&body, 300)
            };
            return Session::failed(
                ChatStreamError::Upstream {
                    status: Some(status.as_u16()),
                    message,
                },
                options,
            );
        }
        if options.format.is_none() {
            options.format = Some(detect_format(resp.headers(), &cfg.stream));
        }
        options.prefixes.get_or_insert(cfg.prefixes);
        Session::new(Box::new(resp), options)
    }
}

fn extract_request_id(headers: &HeaderMap) -> Option<String> {
    static CANDIDATES: [&str; 3] = ["x-request-id", "request-id", "x-amzn-requestid"];
    for k in CANDIDATES {
        if let Some(v) = headers.get(k)
            && let Ok(s) = v.to_str()
        {
            return Some(s.to_string());
        }
    }
    None
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        let mut t = s[..end].to_string();
        t.push_str("...");
        t
    } else {
        s.to_string()
    }
}
