//! Windowed, cache-backed access to a dataset's records.
//!
//! A virtualized list only ever renders a few dozen rows, but asks for them
//! synchronously on every frame. [`WindowedSource`] answers from a cache of
//! fixed-size index slices and fetches missing slices from the record store
//! in the background. Slices are evicted by recency once the cache grows past
//! one and a half times its budget.

mod cache;
pub mod error;
mod source;

pub use crate::source::{WindowOptions, WindowedSource};
