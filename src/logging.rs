//! Console logging and log forwarding to a viewer.
//!
//! [`install`] sets up a `tracing` subscriber that prints `[whyrender]`-prefixed lines
//! to stderr, filtered by `RUST_LOG` (default `info`). While a bridge channel is set
//! with [`forward_to`] (usually through
//! [`Publisher::forward_logs`](crate::bridge::Publisher::forward_logs)), every event
//! passing [`set_log_level`] is also sent to the viewer as a `log` window message.

use async_channel::Sender;
use serde_json::json;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::{Arc, Mutex, Once, OnceLock};
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

use crate::bridge::{LOG_MESSAGE_TYPE, WindowMessage};

const LOG_PREFIX: &str = "[whyrender]";
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::INFO;

static INSTALLED: Once = Once::new();
static TARGET: OnceLock<Mutex<Option<Target>>> = OnceLock::new();
static LOG_LEVEL: OnceLock<Arc<Mutex<LevelFilter>>> = OnceLock::new();

#[derive(Clone)]
struct Target {
    sender: Sender<WindowMessage>,
    origin: String,
}

/// Forwards log lines over a bridge channel, stamped with `origin`. Replaces any
/// earlier target. Has no effect until [`install`] ran.
pub fn forward_to(sender: Sender<WindowMessage>, origin: impl Into<String>) {
    let slot = TARGET.get_or_init(|| Mutex::new(None));
    if let Ok(mut guard) = slot.lock() {
        *guard = Some(Target {
            sender,
            origin: origin.into(),
        });
    }
}

/// Stops forwarding.
pub fn stop_forwarding() {
    if let Some(slot) = TARGET.get()
        && let Ok(mut guard) = slot.lock()
    {
        guard.take();
    }
}

fn target() -> Option<Target> {
    TARGET
        .get()
        .and_then(|slot| slot.lock().ok().and_then(|guard| guard.clone()))
}

fn level_handle() -> Arc<Mutex<LevelFilter>> {
    LOG_LEVEL
        .get_or_init(|| Arc::new(Mutex::new(DEFAULT_LOG_LEVEL)))
        .clone()
}

/// Sets the level of forwarded events. Unknown names fall back to `info`.
pub fn set_log_level(level: &str) {
    let parsed = LevelFilter::from_str(level).unwrap_or(DEFAULT_LOG_LEVEL);
    if let Ok(mut guard) = level_handle().lock() {
        *guard = parsed;
    }
}

/// Installs the global subscriber. Later calls do nothing, and an already installed
/// foreign subscriber is left in place.
pub fn install() {
    INSTALLED.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let console = fmt::layer()
            .with_writer(PrefixedWriter)
            .with_ansi(false)
            .with_filter(filter);

        if tracing_subscriber::registry()
            .with(ForwardLayer::new())
            .with(console)
            .try_init()
            .is_err()
        {
            eprintln!("{LOG_PREFIX} a global subscriber is already set, keeping it");
        }
    });
}

struct ForwardLayer {
    level: Arc<Mutex<LevelFilter>>,
}

impl ForwardLayer {
    fn new() -> Self {
        Self {
            level: level_handle(),
        }
    }
}

impl<S> Layer<S> for ForwardLayer
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let Some(target) = target() else { return };

        let filter = self.level.lock().map_or(DEFAULT_LOG_LEVEL, |guard| *guard);
        if filter < *event.metadata().level() {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let message = WindowMessage {
            origin: target.origin,
            data: log_to_json(
                &visitor.message.unwrap_or_default(),
                event.metadata().level(),
                event.metadata().target(),
            ),
        };
        // A closed viewer ends forwarding.
        if target.sender.try_send(message).is_err() && target.sender.is_closed() {
            stop_forwarding();
        }
    }
}

fn log_to_json(message: &str, level: &Level, target: &str) -> String {
    json!({
        "type": LOG_MESSAGE_TYPE,
        "log": {
            "message": format!("{LOG_PREFIX} {message}"),
            "level": level.as_str(),
            "target": target,
        },
    })
    .to_string()
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_owned());
        }
    }
}

#[derive(Clone, Default)]
struct PrefixedWriter;

impl<'a> MakeWriter<'a> for PrefixedWriter {
    type Writer = PrefixedLine<io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        PrefixedLine {
            inner: io::stderr(),
            wrote_prefix: false,
        }
    }
}

struct PrefixedLine<W> {
    inner: W,
    wrote_prefix: bool,
}

impl<W: Write> Write for PrefixedLine<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.wrote_prefix {
            self.inner.write_all(LOG_PREFIX.as_bytes())?;
            self.inner.write_all(b" ")?;
            self.wrote_prefix = true;
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
