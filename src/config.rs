//! Tracker configuration.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::correlator::ActionRule;
use crate::dom::Selector;
use crate::error::{Error, Result};

/// Default period between two pushes to the viewer.
pub const DEFAULT_PUSH_INTERVAL_MS: u64 = 1000;
/// Default origin stamped on messages sent to the viewer.
pub const DEFAULT_ORIGIN: &str = "http://localhost:3000";

const CONFIG_VAR: &str = "WHYRENDER_CONFIG";
const INTERVAL_VAR: &str = "WHYRENDER_PUSH_INTERVAL_MS";
const ORIGIN_VAR: &str = "WHYRENDER_ORIGIN";

/// Settings for [`Tracker`](crate::Tracker) and the viewer bridge.
///
/// Deserializes from the same JSON shape a page would assign to its tracker config:
///
/// ```json
/// { "events": [{ "event": "keydown", "selectors": ["input"] }], "pushIntervalMs": 500 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerConfig {
    /// Interaction kinds to correlate in addition to the built-in ones.
    pub events: Vec<ActionRule>,
    /// Milliseconds between two pushes to the viewer.
    pub push_interval_ms: u64,
    /// Origin stamped on outgoing viewer messages.
    pub origin: String,
    /// Skip invocable props when diffing.
    pub exclude_callables: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            push_interval_ms: DEFAULT_PUSH_INTERVAL_MS,
            origin: DEFAULT_ORIGIN.to_owned(),
            exclude_callables: true,
        }
    }
}

impl TrackerConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or fails [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str::<Self>(json)?.validate()
    }

    /// Reads configuration from the process environment.
    ///
    /// `WHYRENDER_CONFIG` may hold a full JSON document; `WHYRENDER_PUSH_INTERVAL_MS`
    /// and `WHYRENDER_ORIGIN` override single fields on top of it.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unparsable value.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env), with a custom variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unparsable value.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup(CONFIG_VAR) {
            Some(json) => serde_json::from_str(&json)?,
            None => Self::default(),
        };

        if let Some(raw) = lookup(INTERVAL_VAR) {
            config.push_interval_ms = raw.trim().parse().map_err(|_| Error::InvalidEnv {
                name: INTERVAL_VAR,
                value: raw.clone(),
            })?;
        }

        if let Some(origin) = lookup(ORIGIN_VAR) {
            if origin.trim().is_empty() {
                return Err(Error::InvalidEnv {
                    name: ORIGIN_VAR,
                    value: origin,
                });
            }
            config.origin = origin;
        }

        config.validate()
    }

    /// Checks the interval and every selector of the extra action rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZeroInterval`] or [`Error::InvalidSelector`].
    pub fn validate(self) -> Result<Self> {
        if self.push_interval_ms == 0 {
            return Err(Error::ZeroInterval);
        }
        for rule in &self.events {
            for selector in &rule.selectors {
                selector.parse::<Selector>()?;
            }
        }
        Ok(self)
    }

    /// Adds an interaction kind to correlate.
    #[must_use]
    pub fn with_event<S: Into<String>>(
        mut self,
        event: &str,
        selectors: impl IntoIterator<Item = S>,
    ) -> Self {
        self.events.push(ActionRule::new(event, selectors));
        self
    }

    /// Sets the push interval.
    #[must_use]
    pub fn with_push_interval(mut self, interval: Duration) -> Self {
        self.push_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the origin stamped on outgoing viewer messages.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Chooses whether invocable props are skipped when diffing.
    #[must_use]
    pub const fn with_exclude_callables(mut self, exclude: bool) -> Self {
        self.exclude_callables = exclude;
        self
    }

    /// Push interval as a [`Duration`].
    #[must_use]
    pub const fn push_interval(&self) -> Duration {
        Duration::from_millis(self.push_interval_ms)
    }
}
