//! Minimal element model for correlating user interactions.
//!
//! A host adapter describes a dispatched event as the element path from the target
//! outward, the same order a browser's `composedPath()` reports.

use core::fmt;
use core::str::FromStr;

use indexmap::IndexMap;

use crate::error::Error;

/// An element on an event's dispatch path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: IndexMap<String, String>,
    text: Option<String>,
}

impl Element {
    /// Creates an element with the given tag name.
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// Sets an attribute.
    #[must_use]
    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_owned(), value.into());
        self
    }

    /// Sets the text content.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Tag name, lowercased.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attribute value, if present.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Returns `true` if the attribute is present.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Text content, if any.
    #[must_use]
    pub fn text_content(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Returns `true` if the element matches `selector`.
    #[must_use]
    pub fn matches(&self, selector: &Selector) -> bool {
        selector.tag.as_ref().is_none_or(|tag| *tag == self.tag)
            && selector.filters.iter().all(|filter| match &filter.value {
                Some(expected) => self.attribute(&filter.name) == Some(expected.as_str()),
                None => self.has_attribute(&filter.name),
            })
    }
}

/// A dispatched user interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionEvent {
    /// Event kind, e.g. `click`.
    pub kind: String,
    /// Dispatch path, target first.
    pub path: Vec<Element>,
}

impl InteractionEvent {
    /// Creates an event of `kind` dispatched along `path`.
    #[must_use]
    pub fn new(kind: &str, path: Vec<Element>) -> Self {
        Self {
            kind: kind.to_owned(),
            path,
        }
    }

    /// The element the event was dispatched to.
    #[must_use]
    pub fn target(&self) -> Option<&Element> {
        self.path.first()
    }

    /// Nearest element on the path, the target included, satisfying `predicate`.
    pub fn closest(&self, predicate: impl Fn(&Element) -> bool) -> Option<&Element> {
        self.path.iter().find(|element| predicate(element))
    }
}

/// A compound selector: an optional tag followed by attribute filters.
///
/// Supports `tag`, `*`, `[attr]`, `[attr=value]`, `[attr="value"]` and combinations
/// such as `input[type="checkbox"]`. Combinators and pseudo-classes are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    tag: Option<String>,
    filters: Vec<AttributeFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeFilter {
    name: String,
    value: Option<String>,
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidSelector(source.to_owned());
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let split = trimmed.find('[').unwrap_or(trimmed.len());
        let (tag, mut rest) = trimmed.split_at(split);
        let tag = match tag {
            "" | "*" => None,
            name if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') => {
                Some(name.to_ascii_lowercase())
            }
            _ => return Err(invalid()),
        };

        let mut filters = Vec::new();
        while !rest.is_empty() {
            let inner = rest.strip_prefix('[').ok_or_else(invalid)?;
            let end = inner.find(']').ok_or_else(invalid)?;
            filters.push(parse_filter(&inner[..end]).ok_or_else(invalid)?);
            rest = &inner[end + 1..];
        }

        if tag.is_none() && filters.is_empty() && trimmed != "*" {
            return Err(invalid());
        }
        Ok(Self { tag, filters })
    }
}

fn parse_filter(body: &str) -> Option<AttributeFilter> {
    let valid_name = |name: &str| {
        !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };

    match body.split_once('=') {
        None => {
            let name = body.trim();
            valid_name(name).then(|| AttributeFilter {
                name: name.to_owned(),
                value: None,
            })
        }
        Some((name, value)) => {
            let name = name.trim();
            let value = value.trim();
            let value = ['"', '\'']
                .iter()
                .find_map(|quote| {
                    value
                        .strip_prefix(*quote)
                        .and_then(|rest| rest.strip_suffix(*quote))
                })
                .unwrap_or(value);
            valid_name(name).then(|| AttributeFilter {
                name: name.to_owned(),
                value: Some(value.to_owned()),
            })
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag.as_deref().unwrap_or(if self.filters.is_empty() { "*" } else { "" }))?;
        for filter in &self.filters {
            match &filter.value {
                Some(value) => write!(f, "[{}=\"{value}\"]", filter.name)?,
                None => write!(f, "[{}]", filter.name)?,
            }
        }
        Ok(())
    }
}
