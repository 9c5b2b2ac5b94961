//! External action correlation.
//!
//! Interaction listeners run outside the commit cycle. Each matching event overwrites
//! a single [`LastAction`] slot that the diagnosis driver reads when building records,
//! so a burst of interactions before a commit collapses to the latest one.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dom::{Element, InteractionEvent, Selector};
use crate::error::Result;

/// Registration point for capture-phase listeners at the document boundary.
pub trait ListenerRegistry {
    /// Registers a capture-phase listener for `kind`.
    fn add_capture_listener(&mut self, kind: &str);
}

/// An interaction kind and the selectors its target must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRule {
    /// Event kind, e.g. `click`.
    pub event: String,
    /// Selectors; the target must match at least one.
    pub selectors: Vec<String>,
}

impl ActionRule {
    /// Creates a rule.
    pub fn new<S: Into<String>>(event: &str, selectors: impl IntoIterator<Item = S>) -> Self {
        Self {
            event: event.to_owned(),
            selectors: selectors.into_iter().map(Into::into).collect(),
        }
    }
}

/// Built-in rules: text input, selection change, activation and form submission.
#[must_use]
pub fn default_rules() -> Vec<ActionRule> {
    vec![
        ActionRule::new("input", ["input", "textarea", "select"]),
        ActionRule::new(
            "change",
            [r#"input[type="checkbox"]"#, r#"input[type="radio"]"#, "select"],
        ),
        ActionRule::new(
            "click",
            ["button", "a", r#"div[role="button"]"#, "[data-clickable]"],
        ),
        ActionRule::new("submit", ["form"]),
    ]
}

/// The most recent correlated interaction, shared between listeners and the driver.
#[derive(Debug, Clone, Default)]
pub struct LastAction {
    slot: Arc<Mutex<Option<String>>>,
}

impl LastAction {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored action.
    pub fn set(&self, action: String) {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = Some(action);
        }
    }

    /// Returns the stored action without clearing it.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|guard| guard.clone())
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    event: String,
    selectors: Vec<Selector>,
}

/// Turns interaction events into `kind:component:detail` descriptions.
#[derive(Debug, Clone)]
pub struct Correlator {
    rules: Vec<CompiledRule>,
    last_action: LastAction,
}

impl Correlator {
    /// Creates a correlator over the built-in rules plus `extra`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSelector`](crate::Error::InvalidSelector) if a selector
    /// cannot be parsed.
    pub fn new(
        extra: impl IntoIterator<Item = ActionRule>,
        last_action: LastAction,
    ) -> Result<Self> {
        let rules = default_rules()
            .into_iter()
            .chain(extra)
            .map(|rule| -> Result<CompiledRule> {
                Ok(CompiledRule {
                    selectors: rule
                        .selectors
                        .iter()
                        .map(|selector| selector.parse())
                        .collect::<Result<_>>()?,
                    event: rule.event,
                })
            })
            .collect::<Result<_>>()?;
        Ok(Self { rules, last_action })
    }

    /// Registers one capture-phase listener per rule.
    pub fn install(&self, registry: &mut dyn ListenerRegistry) {
        for rule in &self.rules {
            registry.add_capture_listener(&rule.event);
        }
    }

    /// Event kinds this correlator listens for, in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.event.as_str())
    }

    /// The shared slot this correlator writes to.
    #[must_use]
    pub const fn last_action(&self) -> &LastAction {
        &self.last_action
    }

    /// Handles a dispatched event, returning the stored description if it matched.
    pub fn handle(&self, event: &InteractionEvent) -> Option<String> {
        let target = event.target()?;
        let mut recorded = None;
        for rule in self.rules.iter().filter(|rule| rule.event == event.kind) {
            if !rule.selectors.iter().any(|selector| target.matches(selector)) {
                continue;
            }
            let action = describe(event, target);
            debug!(action = %action, "{} action", event.kind);
            self.last_action.set(action.clone());
            recorded = Some(action);
        }
        recorded
    }
}

fn describe(event: &InteractionEvent, target: &Element) -> String {
    let labelled = event
        .closest(|element| element.has_attribute("class"))
        .or_else(|| event.closest(|element| element.has_attribute("data-component")));
    let component = labelled
        .and_then(|element| {
            element
                .attribute("data-component")
                .or_else(|| element.attribute("class"))
        })
        .filter(|label| !label.is_empty())
        .unwrap_or("Unknown");

    let detail = if event.kind == "click" {
        target
            .text_content()
            .filter(|text| !text.is_empty())
            .or_else(|| target.attribute("aria-label"))
            .unwrap_or("Unknown")
    } else {
        event.kind.as_str()
    };

    format!("{}:{component}:{detail}", event.kind)
}
