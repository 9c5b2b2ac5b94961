//! Periodic push of render data to a separate viewer window.
//!
//! The viewer is an external consumer. It only sees serialized
//! `{"type": "RENDER_DATA", "payload": {"renderData": [..], "componentTree": {..}}}`
//! documents stamped with the sender's origin, and must check that origin before
//! reading anything. Once [`Publisher::forward_logs`] is called, log lines travel the
//! same channel as `{"type": "log", "log": {..}}` documents.
//!
//! Component trees nest two JSON levels per component, so decoding runs without
//! serde_json's recursion limit and grows the stack on demand instead.

use core::time::Duration;
use std::time::Instant;

use async_channel::{Receiver, Sender, TryRecvError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::logging;
use crate::session::RenderView;
use crate::shape::ShapeNode;

/// Message type tag of a render data push.
pub const MESSAGE_TYPE: &str = "RENDER_DATA";

/// Message type tag of a forwarded log line.
pub const LOG_MESSAGE_TYPE: &str = "log";

/// A cross-window message: serialized data plus the origin of its sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowMessage {
    /// Origin of the sending window.
    pub origin: String,
    /// Serialized JSON document.
    pub data: String,
}

/// Creates the channel connecting a [`Publisher`] to a [`Viewer`].
#[must_use]
pub fn channel() -> (Sender<WindowMessage>, Receiver<WindowMessage>) {
    async_channel::unbounded()
}

#[derive(Serialize)]
struct Outgoing<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    payload: &'a RenderView<'a>,
}

#[derive(Deserialize)]
struct Incoming {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    log: Value,
}

/// Render data as decoded by the viewer. Display-only.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPayload {
    /// Diagnostic records, as plain JSON.
    pub render_data: Vec<Value>,
    /// Component shape tree.
    pub component_tree: ShapeNode,
}

/// A log line forwarded from the inspected process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogLine {
    /// Prefixed message text.
    pub message: String,
    /// Level name, such as `INFO`.
    pub level: String,
    /// Module the event came from.
    pub target: String,
}

/// Anything a [`Viewer`] surfaces.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    /// A render data push.
    Render(RenderPayload),
    /// A forwarded log line.
    Log(LogLine),
}

impl Received {
    /// The render payload, if this is one.
    #[must_use]
    pub fn render(self) -> Option<RenderPayload> {
        match self {
            Self::Render(payload) => Some(payload),
            Self::Log(_) => None,
        }
    }
}

fn decode_unbounded<'de, T, D>(deserializer: D) -> core::result::Result<T, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(serde_stacker::Deserializer::new(deserializer))
}

/// Sending side of the bridge, driven by the host on its own timer.
#[derive(Debug)]
pub struct Publisher {
    sender: Sender<WindowMessage>,
    origin: String,
    interval: Duration,
    last_push: Option<Instant>,
    closed: bool,
}

impl Publisher {
    /// Creates a publisher using the origin and interval of `config`.
    #[must_use]
    pub fn new(sender: Sender<WindowMessage>, config: &TrackerConfig) -> Self {
        Self {
            sender,
            origin: config.origin.clone(),
            interval: config.push_interval(),
            last_push: None,
            closed: false,
        }
    }

    /// Mirrors this process's log lines to the viewer, stamped with this publisher's
    /// origin. Replaces any earlier forwarding target.
    pub fn forward_logs(&self) {
        logging::forward_to(self.sender.clone(), self.origin.clone());
    }

    /// Returns `true` once the viewer side has gone away.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns `true` if a push is due at `now`. The first push is always due.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.last_push
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }

    /// Pushes `data` if the interval has elapsed. Returns whether a push happened.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] once the viewer is gone.
    pub fn pump(&mut self, data: &RenderView<'_>, now: Instant) -> Result<bool> {
        if self.closed {
            return Err(Error::ChannelClosed);
        }
        if !self.is_due(now) {
            return Ok(false);
        }
        self.push(data)?;
        self.last_push = Some(now);
        Ok(true)
    }

    /// Pushes `data` right away.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the viewer is gone, or [`Error::Json`] if
    /// the data fails to serialize.
    pub fn push(&mut self, data: &RenderView<'_>) -> Result<()> {
        if self.closed {
            return Err(Error::ChannelClosed);
        }
        let message = WindowMessage {
            origin: self.origin.clone(),
            data: serde_json::to_string(&Outgoing {
                kind: MESSAGE_TYPE,
                payload: data,
            })?,
        };
        if self.sender.try_send(message).is_err() {
            self.closed = true;
            info!("viewer window closed, render data pushes stopped");
            return Err(Error::ChannelClosed);
        }
        debug!(records = data.render_data.len(), "render data pushed");
        Ok(())
    }
}

/// Receiving side of the bridge, living in the viewer window.
#[derive(Debug)]
pub struct Viewer {
    receiver: Receiver<WindowMessage>,
    trusted_origin: String,
}

impl Viewer {
    /// Creates a viewer accepting messages from `trusted_origin` only.
    #[must_use]
    pub fn new(receiver: Receiver<WindowMessage>, trusted_origin: impl Into<String>) -> Self {
        Self {
            receiver,
            trusted_origin: trusted_origin.into(),
        }
    }

    /// Checks and decodes one message. Messages of another type yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UntrustedOrigin`] for a foreign sender and [`Error::Json`] for
    /// a malformed document.
    pub fn decode(&self, message: &WindowMessage) -> Result<Option<Received>> {
        if message.origin != self.trusted_origin {
            return Err(Error::UntrustedOrigin(message.origin.clone()));
        }
        let mut deserializer = serde_json::Deserializer::from_str(&message.data);
        deserializer.disable_recursion_limit();
        let incoming: Incoming = decode_unbounded(&mut deserializer)?;
        deserializer.end()?;

        match incoming.kind.as_str() {
            MESSAGE_TYPE => Ok(Some(Received::Render(decode_unbounded(incoming.payload)?))),
            LOG_MESSAGE_TYPE => Ok(Some(Received::Log(LogLine::deserialize(incoming.log)?))),
            _ => Ok(None),
        }
    }

    /// Returns the next pending message without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] once the publisher is gone and nothing is
    /// pending, or [`Error::Json`] for a malformed trusted message.
    pub fn try_next(&self) -> Result<Option<Received>> {
        loop {
            let message = match self.receiver.try_recv() {
                Ok(message) => message,
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Closed) => return Err(Error::ChannelClosed),
            };
            if let Some(payload) = self.accept(&message)? {
                return Ok(Some(payload));
            }
        }
    }

    /// Waits for the next message.
    ///
    /// # Errors
    ///
    /// Same as [`try_next`](Self::try_next).
    pub async fn next(&self) -> Result<Received> {
        loop {
            let message = self
                .receiver
                .recv()
                .await
                .map_err(|_| Error::ChannelClosed)?;
            if let Some(payload) = self.accept(&message)? {
                return Ok(payload);
            }
        }
    }

    fn accept(&self, message: &WindowMessage) -> Result<Option<Received>> {
        match self.decode(message) {
            Err(Error::UntrustedOrigin(origin)) => {
                warn!(%origin, "dropped message from untrusted origin");
                Ok(None)
            }
            other => other,
        }
    }
}
