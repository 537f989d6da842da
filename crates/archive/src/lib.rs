//! Export archive validation, identity hashing and member access.
//!
//! A user-supplied export is a ZIP container holding several JSON relationship
//! lists. This crate provides the three cheap, side-effect free primitives the
//! rest of the workspace builds on:
//!
//! - **Signature check** ([`validate`], [`Signature::detect`]): inspects the
//!   leading bytes only, so an obviously wrong upload is rejected before any
//!   real work happens.
//! - **Content identity** ([`identify`]): a BLAKE3 digest over the full byte
//!   content. It is the sole cache key everywhere else; byte-identical archives
//!   always produce the same [`DatasetIdentity`].
//! - **Member access** ([`Archive`]): list and read members of the container.

pub mod error;
mod identity;
mod reader;
mod signature;

pub use crate::identity::{DatasetIdentity, identify};
pub use crate::reader::Archive;
pub use crate::signature::{Signature, validate};
