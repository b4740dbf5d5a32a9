//! Event sinks
//!
//! The session hands every dispatch to an [`EventSink`] under its delivered
//! name (see [`events::sink_name`](cordcutter_core::protocol::events::sink_name)),
//! and every decoded payload to [`EventSink::raw`]. Sinks are called from the
//! session task and must not block.

use cordcutter_core::payload::Payload;
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

/// Receives gateway events
pub trait EventSink: Send + Sync + 'static {
    /// Called for each dispatch payload
    fn dispatch(&self, event: &str, data: &Value);

    /// Called for every decoded payload, dispatches included
    fn raw(&self, _payload: &Payload) {}
}

/// Event delivered through a [`ChannelSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// A dispatch under its delivered name
    Dispatch {
        /// Event name
        name: String,
        /// Event data
        data: Value,
    },
    /// A decoded payload of any op code
    Raw(Payload),
}

/// Sink forwarding events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<GatewayEvent>,
    forward_raw: bool,
}

impl ChannelSink {
    /// Sink forwarding dispatches only
    pub fn new() -> (Self, mpsc::UnboundedReceiver<GatewayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                forward_raw: false,
            },
            rx,
        )
    }

    /// Sink forwarding dispatches and every raw payload
    pub fn with_raw() -> (Self, mpsc::UnboundedReceiver<GatewayEvent>) {
        let (mut sink, rx) = Self::new();
        sink.forward_raw = true;
        (sink, rx)
    }
}

impl EventSink for ChannelSink {
    fn dispatch(&self, event: &str, data: &Value) {
        // Receiver dropped means nobody is listening any more
        let _ = self.tx.send(GatewayEvent::Dispatch {
            name: event.to_string(),
            data: data.clone(),
        });
    }

    fn raw(&self, payload: &Payload) {
        if self.forward_raw {
            let _ = self.tx.send(GatewayEvent::Raw(payload.clone()));
        }
    }
}

/// Sink calling a function for each dispatch
pub struct FnSink<F> {
    f: F,
}

impl<F> FnSink<F> {
    /// Create a new function-based sink
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventSink for FnSink<F>
where
    F: Fn(&str, &Value) + Send + Sync + 'static,
{
    fn dispatch(&self, event: &str, data: &Value) {
        (self.f)(event, data)
    }
}

impl<F> fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSink").field("f", &"<function>").finish()
    }
}

/// Create a sink from a function
pub fn from_fn<F>(f: F) -> FnSink<F>
where
    F: Fn(&str, &Value) + Send + Sync + 'static,
{
    FnSink::new(f)
}

/// Sink discarding every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn dispatch(&self, _event: &str, _data: &Value) {}
}
