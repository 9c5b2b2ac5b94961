//! Core building blocks for `whyrender`.
//!
//! This crate holds everything the diagnosis engine needs that does not depend on a
//! particular host framework:
//!
//! - [`Input`], the live value model a host adapter hands over (shared, possibly cyclic),
//! - [`sanitize()`], which freezes a live value into acyclic JSON,
//! - [`deep_equal()`] and [`change_set()`], the structural comparison primitives,
//! - [`UnitTree`], the arena mirror of the host's render tree.
//!
//! # Example
//!
//! ```rust
//! use whyrender_core::{Unit, UnitTree};
//!
//! let mut tree = UnitTree::new();
//! let root = tree.set_root(Unit::component("App"));
//! tree.push_child(root, Unit::component("Counter").with_prop("count", 1));
//! assert_eq!(tree.len(), 2);
//! ```

extern crate alloc;

pub mod diff;
pub mod input;
pub mod sanitize;
pub mod unit;

pub use diff::{Change, ChangeSet, DiffOptions, change_set, deep_equal};
pub use input::{Callable, Fields, Input, Opaque};
pub use sanitize::{Bag, sanitize, sanitize_bag};
pub use unit::{ContextRead, HookSlot, NodeId, Unit, UnitKind, UnitTree};
