//! Per-session summaries for decode sessions.
//!
//! Every `Session` hands exactly one [`SessionTrace`] to the installed sink when it
//! reaches `Completed`, `Cancelled` or `Failed`, including sessions created already
//! failed. Sessions dropped before a terminal state record nothing. With no sink
//! installed the trace is discarded.

pub mod keys;
pub mod types;
#[cfg(test)]
pub mod test_span;

pub use keys::*;
pub use types::*;

use std::sync::Arc;

use once_cell::sync::OnceCell;

/// Receives one [`SessionTrace`] per finished session.
///
/// `record` runs synchronously at the terminal transition: inside `next_event`,
/// before the terminal `SessionEvent` is returned, or inside `Session::failed` for
/// a session that never read. A slow sink delays that event.
///
/// The trace's `snapshots` counts only snapshots the caller actually received;
/// `events` counts decoded events applied to the draft.
pub trait TelemetrySink: Send + Sync + 'static {
    fn record(&self, trace: crate::telemetry::SessionTrace);
}

static TELEMETRY_SINK: OnceCell<Arc<dyn TelemetrySink>> = OnceCell::new();

// Tests share the process-wide sink; each test thread opts in.
#[cfg(test)]
thread_local! {
    static TEST_CAPTURE: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// Install the process-wide sink. The first call wins; later calls return `false`
/// and leave the installed sink in place.
pub fn set_telemetry_sink(sink: Arc<dyn TelemetrySink>) -> bool {
    TELEMETRY_SINK.set(sink).is_ok()
}

/// Called from `Session::conclude`. Under `cfg(test)` this is a no-op unless the
/// current thread enabled capture.
#[inline]
pub(crate) fn emit(trace: crate::telemetry::SessionTrace) {
    #[cfg(test)]
    {
        if !TEST_CAPTURE.with(|c| c.get()) {
            return;
        }
    }
    if let Some(sink) = TELEMETRY_SINK.get() {
        sink.record(trace);
    }
}

#[cfg(test)]
/// Enable or disable trace delivery for the current test thread.
pub fn test_set_capture_enabled(enabled: bool) {
    TEST_CAPTURE.with(|c| c.set(enabled));
}
