//! Capability-gated installation and the host-facing [`Tracker`].
//!
//! ```text
//! ┌─────────────┐ on_commit ┌───────────┐ commit ┌──────────┐
//! │ CommitHook  │──────────▶│  Tracker  │───────▶│ Session  │
//! └─────────────┘           └───────────┘        └──────────┘
//!                             │       ▲               │
//!              handle_event   │       │ LastAction    │ render_data
//!                             ▼       │               ▼
//!                         ┌────────────┐         ┌───────────┐
//!                         │ Correlator │         │ Publisher │
//!                         └────────────┘         └───────────┘
//! ```
//!
//! Without a commit hook the tracker is inert: installation succeeds, nothing is
//! observed, and every query returns empty data.

use alloc::rc::Rc;
use core::cell::RefCell;
use std::time::Instant;

use tracing::{info, warn};
use whyrender_core::UnitTree;

use crate::bridge::Publisher;
use crate::config::TrackerConfig;
use crate::correlator::{Correlator, LastAction, ListenerRegistry};
use crate::dom::InteractionEvent;
use crate::error::Result;
use crate::session::{Phase, RenderData, RenderView, Session};

/// Callback invoked with the committed render tree.
pub type CommitCallback = Box<dyn FnMut(&UnitTree)>;

/// The host's commit notification capability.
pub trait CommitHook {
    /// Registers `callback` to run after every commit.
    fn on_commit(&mut self, callback: CommitCallback);
}

/// Host-facing handle over a diagnosis session.
#[derive(Debug)]
pub struct Tracker {
    session: Option<Rc<RefCell<Session>>>,
    correlator: Option<Correlator>,
    config: TrackerConfig,
}

impl Tracker {
    /// Installs a tracker on `hook`.
    ///
    /// When `hook` is `None` the host has no commit notification and an inert tracker
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails [`TrackerConfig::validate`].
    pub fn install<H: CommitHook + ?Sized>(
        hook: Option<&mut H>,
        config: TrackerConfig,
    ) -> Result<Self> {
        let config = config.validate()?;
        let Some(hook) = hook else {
            info!("no commit hook available, render tracking disabled");
            return Ok(Self {
                session: None,
                correlator: None,
                config,
            });
        };

        let last_action = LastAction::new();
        let correlator = Correlator::new(config.events.clone(), last_action.clone())?;
        let session = Rc::new(RefCell::new(
            Session::new(last_action).with_exclude_callables(config.exclude_callables),
        ));

        let weak = Rc::downgrade(&session);
        hook.on_commit(Box::new(move |tree| {
            let Some(session) = weak.upgrade() else {
                return;
            };
            let Ok(mut session) = session.try_borrow_mut() else {
                warn!("commit arrived while the previous one was still being diagnosed, ignored");
                return;
            };
            session.commit(tree);
        }));

        info!(
            kinds = ?correlator.kinds().collect::<Vec<_>>(),
            "render tracker installed"
        );
        Ok(Self {
            session: Some(session),
            correlator: Some(correlator),
            config,
        })
    }

    /// Returns `true` if commits are being observed.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// The last correlated interaction, if any.
    #[must_use]
    pub fn last_action(&self) -> Option<String> {
        self.correlator
            .as_ref()
            .and_then(|correlator| correlator.last_action().get())
    }

    /// Owned copy of the log and shape tree. Empty when inert.
    #[must_use]
    pub fn render_data(&self) -> RenderData {
        self.with_render_data(|view| view.to_owned_data())
    }

    /// Runs `f` over a borrowed view of the live log and shape tree.
    ///
    /// Commits arriving while `f` runs are ignored.
    pub fn with_render_data<R>(&self, f: impl FnOnce(RenderView<'_>) -> R) -> R {
        match self.session.as_ref().and_then(|session| session.try_borrow().ok()) {
            Some(session) => f(session.render_data()),
            None => f(RenderData::default().view()),
        }
    }

    /// Drops the log, counters, snapshots and shape tree.
    pub fn clear_render_data(&self) {
        if let Some(session) = &self.session {
            match session.try_borrow_mut() {
                Ok(mut session) => session.clear(),
                Err(_) => warn!("render data is in use, clear ignored"),
            }
        }
    }

    /// Current phase of the session, `Idle` when inert.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.session
            .as_ref()
            .and_then(|session| session.try_borrow().ok().map(|session| session.phase()))
            .unwrap_or_default()
    }

    /// Records per second since the first record.
    #[must_use]
    pub fn render_frequency(&self) -> f64 {
        self.session
            .as_ref()
            .and_then(|session| {
                session
                    .try_borrow()
                    .ok()
                    .map(|session| session.render_frequency())
            })
            .unwrap_or_default()
    }

    /// Registers the correlator's capture-phase listeners on `registry`.
    pub fn install_listeners(&self, registry: &mut dyn ListenerRegistry) {
        if let Some(correlator) = &self.correlator {
            correlator.install(registry);
        }
    }

    /// Feeds a dispatched interaction to the correlator.
    pub fn handle_event(&self, event: &InteractionEvent) -> Option<String> {
        self.correlator.as_ref()?.handle(event)
    }

    /// Pushes the current render data through `publisher` if its interval elapsed.
    ///
    /// # Errors
    ///
    /// Propagates [`Publisher::pump`] errors.
    pub fn pump(&self, publisher: &mut Publisher, now: Instant) -> Result<bool> {
        let Some(session) = &self.session else {
            return Ok(false);
        };
        let Ok(session) = session.try_borrow() else {
            return Ok(false);
        };
        publisher.pump(&session.render_data(), now)
    }
}
