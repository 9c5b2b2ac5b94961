//! Diagnostic records: the externally visible output of a commit.

use core::fmt;
use core::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use whyrender_core::ChangeSet;

/// Why a unit rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// No snapshot existed: first render of this identity.
    Mounted,
    /// These props changed.
    Props(Vec<String>),
    /// These state slots changed.
    State(Vec<String>),
    /// A subscribed context changed.
    Context,
    /// Nothing changed locally but an ancestor did.
    ParentRerender,
    /// Nothing explains the render.
    Unknown,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mounted => f.write_str("Mounted"),
            Self::Props(keys) => write!(f, "Props: {}", keys.join(", ")),
            Self::State(keys) => write!(f, "State: {}", keys.join(", ")),
            Self::Context => f.write_str("Context"),
            Self::ParentRerender => f.write_str("Parent re-render"),
            Self::Unknown => f.write_str("Unknown"),
        }
    }
}

/// The kind of upstream change a render was attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cause {
    /// State slots of the attributed unit.
    State(Vec<String>),
    /// The attributed unit is the nearest context provider.
    Context,
    /// The attributed unit is the parent, which re-rendered.
    ParentRerender,
}

/// Best-effort attribution of a render to an upstream unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Causation {
    /// Name of the attributed unit.
    pub unit: String,
    /// What changed there.
    pub cause: Cause,
}

impl fmt::Display for Causation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Cause::State(keys) => write!(f, "{}:State:{}", self.unit, keys.join(", ")),
            Cause::Context => write!(f, "{}:Context", self.unit),
            Cause::ParentRerender => write!(f, "{}:Parent re-render", self.unit),
        }
    }
}

/// A missed or available memoization opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    /// A memoized unit rendered although its inputs were unchanged.
    UnnecessaryRender,
    /// An unmemoized unit keeps rendering only because an ancestor did.
    ConsiderMemo,
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnnecessaryRender => "Unnecessary re-render (memoized component)",
            Self::ConsiderMemo => "Consider memoizing to prevent unnecessary re-renders",
        })
    }
}

macro_rules! serialize_as_display {
    ($($ty:ty),*) => {
        $(
            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.collect_str(self)
                }
            }
        )*
    };
}

serialize_as_display!(Reason, Causation, Hint);

/// One rendered unit in one commit. Immutable once appended to the log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Stable identity of the unit.
    pub id: String,
    /// Component path, e.g. `App/TaskList/TaskItem`.
    pub component: String,
    /// Renders of this identity since the last reset, this one included.
    pub render_count: u32,
    /// Reasons, never empty.
    pub reasons: Vec<Reason>,
    /// Changed props, `None` when none changed.
    pub props_changes: Option<ChangeSet>,
    /// Changed state slots, `None` when none changed.
    pub state_changes: Option<ChangeSet>,
    /// Whether a subscribed context changed.
    pub context_changed: bool,
    /// Display names of the subscribed contexts.
    pub context_names: Option<Vec<String>>,
    /// Nearest context provider, when a context change was traced to one.
    pub context_provider: Option<String>,
    /// Effect dependency lists.
    pub hook_dependencies: Option<Vec<Value>>,
    /// Whether something upstream changed in this commit.
    pub parent_changed: bool,
    /// Component path of the nearest diagnosed ancestor.
    pub parent: Option<String>,
    /// Best-effort attribution.
    pub caused_by: Option<Causation>,
    /// Component names from the attributed unit down to the parent.
    pub propagation_path: Option<Vec<String>>,
    /// Most recent correlated user interaction.
    pub trigger: Option<String>,
    /// Wall-clock time the record was built.
    pub timestamp: DateTime<Utc>,
    /// Time since the walk started.
    #[serde(rename = "duration", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Optimization hint.
    pub memo_warning: Option<Hint>,
}

impl Diagnostic {
    /// Reasons joined the way they are shown to a reader.
    #[must_use]
    pub fn reason_summary(&self) -> String {
        self.reasons
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Returns `true` if this was the unit's first render.
    #[must_use]
    pub fn is_mount(&self) -> bool {
        self.reasons.contains(&Reason::Mounted)
    }
}

#[allow(clippy::cast_precision_loss)]
fn serialize_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_nanos() as f64 / 1_000_000.0)
}
