//! Event sinks - where emitted events go.
//!
//! The engine never renders anything itself. A view layer plugs in an
//! [`EventSink`]; the simulation harness records events for inspection.

use crate::events::{Emitted, LogLevel, SimEvent};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Consumer of engine events.
///
/// `emit` is synchronous: all state changes between two suspension points
/// of the engine happen without yielding.
pub trait EventSink: Send + Sync {
    fn emit(&self, emitted: Emitted);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _emitted: Emitted) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Emitted>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<Emitted> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Just the events, without stamps.
    pub fn events(&self) -> Vec<SimEvent> {
        self.snapshot().into_iter().map(|e| e.event).collect()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops everything recorded so far.
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, emitted: Emitted) {
        if let Ok(mut events) = self.events.lock() {
            events.push(emitted);
        }
    }
}

/// Forwards events to a live consumer over an unbounded channel.
///
/// A closed receiver is not an error; the view simply went away.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Emitted>,
}

impl ChannelSink {
    /// Creates the sink together with its receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Emitted>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, emitted: Emitted) {
        let _ = self.tx.send(emitted);
    }
}

/// Writes log-worthy events to `tracing`.
///
/// Per-cell highlights go to TRACE so the default output stays readable.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, emitted: Emitted) {
        let Emitted { epoch, at_ms, event } = emitted;
        match event {
            SimEvent::LogMessage { text, level } => match level {
                LogLevel::Info | LogLevel::Success => {
                    tracing::info!(epoch, at_ms, "{}", text)
                }
                LogLevel::Warning => tracing::warn!(epoch, at_ms, "{}", text),
                LogLevel::Error => tracing::error!(epoch, at_ms, "{}", text),
            },
            SimEvent::RunFailed { message } => {
                tracing::error!(epoch, at_ms, "run failed: {}", message)
            }
            SimEvent::CellComputing { .. } => tracing::trace!(epoch, at_ms, ?event),
            other => tracing::debug!(epoch, at_ms, event = ?other),
        }
    }
}
