//! One decode-and-reduce lifecycle, from the first byte to a terminal state.
//!
//! The session is a cooperative read loop with a single suspension point: awaiting
//! the next chunk from its `ChunkReader`. A chunk is framed and parsed eagerly, but
//! its events are applied to the draft one per `next_event` call, so the draft is
//! always the last snapshot handed out and a stop never leaks content the caller
//! has not seen.
//!
//! State machine: `Active -> {Completed, Cancelled, Failed}`; terminal states have
//! no transitions out and exactly one terminal `SessionEvent` is produced.

use std::collections::VecDeque;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing_futures::Instrument;

use crate::decode::{FrameDecode, FramePrefixes, WireFormat, decoder_for};
use crate::error::{ChatStreamError, CoreResult};
use crate::model::Message;
use crate::reducer::{Applied, StreamReducer};
use crate::stream::{BoxSessionStream, Event, SessionEvent, Snapshot};
use crate::telemetry::{self, SessionTrace};

/// Source of raw body chunks.
#[async_trait]
pub trait ChunkReader: Send {
    /// Next chunk, or `None` once the body is exhausted.
    async fn read(&mut self) -> CoreResult<Option<Bytes>>;

    /// Release the in-flight read. The reader is dropped right after.
    async fn cancel(&mut self) {}
}

/// Adapts any byte stream into a `ChunkReader`.
pub struct StreamReader<S> {
    inner: Option<S>,
}

impl<S> StreamReader<S> {
    pub fn new(inner: S) -> Self {
        Self { inner: Some(inner) }
    }
}

#[async_trait]
impl<S> ChunkReader for StreamReader<S>
where
    S: futures::Stream<Item = CoreResult<Bytes>> + Send + Unpin,
{
    async fn read(&mut self) -> CoreResult<Option<Bytes>> {
        match self.inner.as_mut() {
            Some(s) => s.next().await.transpose(),
            None => Ok(None),
        }
    }

    async fn cancel(&mut self) {
        self.inner = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

/// Cancels a session. Idempotent, and safe after the session has ended.
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Per-session inputs.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// `None` defers to the response headers or the configured default.
    pub format: Option<WireFormat>,
    /// `None` defers to the configured prefixes, else the defaults.
    pub prefixes: Option<FramePrefixes>,
    /// Messages published ahead of the draft in every snapshot.
    pub prior_messages: Vec<Message>,
    /// Data published ahead of this session's payloads in every snapshot.
    pub prior_data: Vec<Value>,
}

impl SessionOptions {
    pub fn new(format: WireFormat) -> Self {
        Self {
            format: Some(format),
            ..Default::default()
        }
    }

    pub fn prefixes(mut self, prefixes: FramePrefixes) -> Self {
        self.prefixes = Some(prefixes);
        self
    }

    pub fn prior_messages(mut self, messages: Vec<Message>) -> Self {
        self.prior_messages = messages;
        self
    }

    pub fn prior_data(mut self, data: Vec<Value>) -> Self {
        self.prior_data = data;
        self
    }
}

enum Read {
    Chunk(Bytes),
    Eof,
    Cancelled,
    Failed(ChatStreamError),
}

/// Decoded but not yet applied.
enum Queued {
    Event(Event),
    Eof,
    Failed(ChatStreamError),
}

pub struct Session {
    reader: Option<Box<dyn ChunkReader>>,
    decoder: Box<dyn FrameDecode>,
    reducer: StreamReducer,
    format: WireFormat,
    prior_messages: Vec<Message>,
    prior_data: Vec<Value>,
    token: CancellationToken,
    state: SessionState,
    pending: VecDeque<Queued>,
    end_seen: bool,
    terminal: Option<SessionEvent>,
    published: usize,
    events_applied: usize,
    bytes_read: usize,
    started: Instant,
    span: tracing::Span,
}

impl Session {
    pub fn new(reader: Box<dyn ChunkReader>, options: SessionOptions) -> Self {
        Self::build(Some(reader), options)
    }

    fn build(reader: Option<Box<dyn ChunkReader>>, options: SessionOptions) -> Self {
        let format = options.format.unwrap_or_default();
        let reducer = StreamReducer::new();
        let span = tracing::info_span!(
            "chatstream.session",
            "session.id" = %reducer.draft().id,
            "stream.format" = %format,
            "session.outcome" = tracing::field::Empty,
            "stream.bytes" = tracing::field::Empty,
            "stream.events" = tracing::field::Empty,
            "error.kind" = tracing::field::Empty,
            "error.message" = tracing::field::Empty,
        );
        Self {
            reader,
            decoder: decoder_for(format, options.prefixes.unwrap_or_default()),
            reducer,
            format,
            prior_messages: options.prior_messages,
            prior_data: options.prior_data,
            token: CancellationToken::new(),
            state: SessionState::Active,
            pending: VecDeque::new(),
            end_seen: false,
            terminal: None,
            published: 0,
            events_applied: 0,
            bytes_read: 0,
            started: Instant::now(),
            span,
        }
    }

    /// Convenience: wrap a byte stream.
    pub fn from_stream<S>(stream: S, options: SessionOptions) -> Self
    where
        S: futures::Stream<Item = CoreResult<Bytes>> + Send + Unpin + 'static,
    {
        Self::new(Box::new(StreamReader::new(stream)), options)
    }

    /// A session that failed before reading anything (e.g. non-success status).
    pub fn failed(error: ChatStreamError, options: SessionOptions) -> Self {
        let mut s = Self::build(None, options);
        s.fail(error);
        s
    }

    pub fn id(&self) -> &str {
        &self.reducer.draft().id
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: self.token.clone(),
        }
    }

    /// Snapshots handed out so far.
    pub fn published(&self) -> usize {
        self.published
    }

    /// Next published event; `None` after the terminal event has been returned.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let span = self.span.clone();
        self.step().instrument(span).await
    }

    pub fn into_stream(self) -> BoxSessionStream {
        futures::stream::unfold(self, |mut session| async move {
            let ev = session.next_event().await?;
            Some((ev, session))
        })
        .boxed()
    }

    /// Applies at most one decoded event per call, so the draft never runs ahead
    /// of what the caller has seen. A stop discards everything still queued.
    async fn step(&mut self) -> Option<SessionEvent> {
        loop {
            if self.state.is_terminal() {
                self.release().await;
                return self.terminal.take();
            }
            if self.token.is_cancelled() {
                if !self.pending.is_empty() {
                    tracing::debug!(dropped = self.pending.len(), "stop discards queued events");
                    self.pending.clear();
                }
                self.conclude(SessionState::Cancelled, None);
                continue;
            }
            let Some(next) = self.pending.pop_front() else {
                self.read_next().await;
                continue;
            };
            match next {
                Queued::Event(event) => {
                    self.events_applied += 1;
                    match self.reducer.apply(event) {
                        Ok(Applied::Draft | Applied::Data) => return Some(self.publish()),
                        Ok(Applied::End) => {
                            if let Some(snapshot) = self.complete() {
                                self.release().await;
                                return Some(snapshot);
                            }
                        }
                        Err(e) => self.fail(e),
                    }
                }
                Queued::Eof => {
                    if let Some(snapshot) = self.complete() {
                        self.release().await;
                        return Some(snapshot);
                    }
                }
                Queued::Failed(e) => self.fail(e),
            }
        }
    }

    async fn read_next(&mut self) {
        match self.read_chunk().await {
            Read::Chunk(chunk) => {
                self.bytes_read += chunk.len();
                self.decode(|d, emit| d.feed(&chunk, emit));
            }
            Read::Eof => {
                self.decode(|d, emit| d.finish(emit));
                self.pending.push_back(Queued::Eof);
            }
            // picked up from the token on the next turn
            Read::Cancelled => {}
            Read::Failed(e) => self.pending.push_back(Queued::Failed(e)),
        }
    }

    async fn read_chunk(&mut self) -> Read {
        if self.token.is_cancelled() {
            return Read::Cancelled;
        }
        let token = self.token.clone();
        let Some(reader) = self.reader.as_mut() else {
            return Read::Eof;
        };
        tokio::select! {
            biased;
            _ = token.cancelled() => Read::Cancelled,
            res = reader.read() => match res {
                Ok(Some(chunk)) => Read::Chunk(chunk),
                Ok(None) => Read::Eof,
                Err(e) => Read::Failed(e),
            },
        }
    }

    /// Runs the front end and queues what it emits, in order. A decode error is
    /// queued behind the events that preceded it.
    fn decode<F>(&mut self, drive: F)
    where
        F: FnOnce(&mut dyn FrameDecode, &mut dyn FnMut(Event) -> CoreResult<()>) -> CoreResult<()>,
    {
        let Self {
            decoder,
            pending,
            end_seen,
            ..
        } = self;
        let mut emit = |event: Event| -> CoreResult<()> {
            if *end_seen {
                // frames after an end marker are ignored
                return Ok(());
            }
            if event == Event::End {
                *end_seen = true;
            }
            pending.push_back(Queued::Event(event));
            Ok(())
        };
        let res = drive(&mut **decoder, &mut emit);
        match res {
            // whatever follows an end marker is not part of the stream
            Err(_) if *end_seen => {}
            Err(e) => pending.push_back(Queued::Failed(e)),
            Ok(()) => {}
        }
    }

    fn publish(&mut self) -> SessionEvent {
        self.published += 1;
        SessionEvent::Snapshot(build_snapshot(
            &self.reducer,
            &self.prior_messages,
            &self.prior_data,
        ))
    }

    /// Natural completion. Returns the snapshot of a function call parsed at the
    /// end, which goes out ahead of `Finished`.
    fn complete(&mut self) -> Option<SessionEvent> {
        match self.reducer.finish() {
            Ok(changed) => {
                let snapshot = changed.then(|| self.publish());
                self.conclude(SessionState::Completed, None);
                snapshot
            }
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    fn fail(&mut self, error: ChatStreamError) {
        self.conclude(SessionState::Failed, Some(error));
    }

    fn conclude(&mut self, state: SessionState, error: Option<ChatStreamError>) {
        debug_assert!(!self.state.is_terminal(), "session concluded twice");
        self.state = state;

        let latency_ms = self.started.elapsed().as_millis() as u64;
        self.span.record(telemetry::KEY_SESSION_OUTCOME, state.as_str());
        self.span.record(telemetry::KEY_STREAM_BYTES, self.bytes_read as u64);
        self.span.record(telemetry::KEY_STREAM_EVENTS, self.events_applied as u64);

        let mut trace = SessionTrace::new(self.id(), self.format.as_str())
            .outcome(state.as_str())
            .bytes(self.bytes_read as u64)
            .events(self.events_applied as u64)
            .snapshots(self.published as u64)
            .latency_ms(latency_ms);

        // the draft is exactly what the last snapshot showed
        let message = self.reducer.draft().to_message();
        let data = self.reducer.data().items().to_vec();
        let terminal = match (state, error) {
            (SessionState::Failed, Some(error)) => {
                tracing::warn!(error = %error, kind = error.kind(), published = self.published, "session failed");
                let rendered = error.to_string();
                self.span.record(telemetry::KEY_ERROR_KIND, error.kind());
                self.span.record(telemetry::KEY_ERROR_MESSAGE, rendered.as_str());
                trace = trace.error(error.kind(), &rendered);
                SessionEvent::Failed {
                    error,
                    published: self.published > 0,
                }
            }
            (SessionState::Cancelled, _) => {
                tracing::info!(content_len = message.content.len(), "session cancelled");
                SessionEvent::Cancelled { message, data }
            }
            _ => {
                tracing::info!(
                    content_len = message.content.len(),
                    function_call = message.function_call.is_some(),
                    data = data.len(),
                    latency_ms,
                    "session completed"
                );
                SessionEvent::Finished { message, data }
            }
        };
        self.terminal = Some(terminal);
        telemetry::emit(trace);
    }

    async fn release(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.cancel().await;
        }
    }
}

fn build_snapshot(reducer: &StreamReducer, prior_messages: &[Message], prior_data: &[Value]) -> Snapshot {
    let mut messages = Vec::with_capacity(prior_messages.len() + 1);
    messages.extend_from_slice(prior_messages);
    messages.push(reducer.draft().to_message());
    let mut data = prior_data.to_vec();
    data.extend_from_slice(reducer.data().items());
    Snapshot { messages, data }
}
