//! # foundry-ops — built-in composite operations
//!
//! [`Conditional`] (1-of-N branch, branch-remembered compensation) and
//! [`ForEach`] (bounded-parallel fan-out with optional data splitting and
//! timeout) — both are regular [`foundry_core::Operation`]s, so they
//! compose freely with each other and with user-authored operations.

#![deny(missing_docs)]

pub mod condition;
pub mod conditional;
pub mod foreach;

pub use condition::{Condition, condition_fn, simple_condition_fn, typed_condition_fn};
pub use conditional::Conditional;
pub use foreach::{DataStrategy, ForEach, ForEachResults};
