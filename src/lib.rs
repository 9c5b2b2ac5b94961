#![doc = include_str!("../README.md")]
#![allow(clippy::multiple_crate_versions)]

extern crate alloc;

pub mod bridge;
pub mod causality;
pub mod config;
pub mod correlator;
pub mod dom;
/// Error types for configuration and the viewer bridge.
pub mod error;
pub mod hook;
pub mod identity;
pub mod logging;
pub mod record;
pub mod session;
pub mod shape;
pub mod snapshot;

pub use bridge::{LogLine, Publisher, Received, RenderPayload, Viewer, WindowMessage};
pub use config::TrackerConfig;
pub use correlator::{ActionRule, Correlator, LastAction, ListenerRegistry};
pub use dom::{Element, InteractionEvent, Selector};
pub use error::{Error, Result};
pub use hook::{CommitCallback, CommitHook, Tracker};
pub use record::{Causation, Cause, Diagnostic, Hint, Reason};
pub use session::{CommitSummary, Phase, RenderData, RenderView, Session};
pub use shape::ShapeNode;

#[doc(inline)]
pub use whyrender_core::{
    Callable, Change, ChangeSet, ContextRead, HookSlot, Input, NodeId, Opaque, Unit, UnitKind,
    UnitTree,
};

pub use tracing as log;
