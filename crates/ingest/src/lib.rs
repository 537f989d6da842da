//! Archive ingestion pipeline.
//!
//! Turns a raw export archive into a persisted dataset:
//!
//! 1. signature check and content identity,
//! 2. cache check (an already ingested identity returns immediately),
//! 3. member discovery and JSON parsing, collecting [`ParseWarning`]s,
//! 4. merging into unified account records in fixed-size batches,
//! 5. batched persistence, with the dataset metadata written last.
//!
//! Progress is reported and the [`CancellationToken`] checked at every batch
//! boundary. A cancelled or failed ingestion never leaves a dataset visible
//! in the store.
//!
//! [`ParseWarning`]: rollcall_extract::models::ParseWarning
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

mod collect;
pub mod error;
mod merge;
mod outcome;
mod stream;
#[cfg(test)]
mod testing;

pub use crate::outcome::{IngestEvent, IngestOptions, IngestOutcome, Progress, RawArchive, Stage};
pub use crate::stream::{ingest, ingest_stream};
