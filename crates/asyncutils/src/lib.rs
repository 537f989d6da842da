//! Small async helpers for interactive callers.
//!
//! - [`Latest`] hands out tickets so that only the most recently issued
//!   request gets its result applied; older completions are dropped.
//! - [`debounce`] holds back a stream's items until it has been quiet for a
//!   while, then emits only the latest one.

mod debounce;
mod latest;

pub use crate::debounce::{Debounce, debounce};
pub use crate::latest::{Latest, Ticket};
