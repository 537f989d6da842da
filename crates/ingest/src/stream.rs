use crate::collect::{Extraction, extract, signature_warning};
use crate::error::{ErrorKind, Result};
use crate::merge::Merger;
use crate::outcome::{IngestEvent, IngestOptions, IngestOutcome, Progress, RawArchive, Stage};
use async_stream::try_stream;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use rollcall_archive::{DatasetIdentity, identify};
use rollcall_extract::models::{DatasetMetadata, FileDiscovery, ParseWarning, WarningCode};
use rollcall_store::StoreHandle;
use std::pin::pin;
use std::sync::Arc;
use time::UtcDateTime;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.or_raise(|| ErrorKind::Task)
}

/// Best-effort removal of whatever an interrupted ingestion wrote. The data
/// is invisible without metadata either way.
async fn purge(store: &StoreHandle, identity: &DatasetIdentity) {
    if let Err(error) = store.delete_dataset(identity).await {
        tracing::warn!(identity = %identity.short(), ?error, "Could not remove partial dataset");
    }
}

fn finished(outcome: IngestOutcome) -> IngestEvent {
    IngestEvent::Complete(Box::new(outcome))
}

fn failed(mut warnings: Vec<ParseWarning>, discovery: Option<FileDiscovery>) -> IngestEvent {
    ParseWarning::sort(&mut warnings);
    if let Some(primary) = warnings.first() {
        tracing::info!(code = %primary.code, warnings = warnings.len(), "Ingestion failed");
    }
    finished(IngestOutcome::Failed { warnings, discovery })
}

/// Ingest an archive, reporting each step as an [`IngestEvent`].
///
/// The stream always starts with [`IngestEvent::Started`] and, unless an
/// infrastructure error is yielded, ends with [`IngestEvent::Complete`].
/// Problems with the archive are reported inside the outcome, not as `Err`.
pub fn ingest_stream<'a>(
    store: &'a StoreHandle,
    archive: RawArchive,
    options: IngestOptions,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<IngestEvent>> + 'a {
    let batch_size = options.batch_size.max(1);
    try_stream! {
        yield IngestEvent::Started;
        let RawArchive { name, bytes } = archive;
        let byte_size = bytes.len() as u64;

        if let Some(warning) = signature_warning(&bytes) {
            yield failed(vec![warning], None);
            return;
        }

        let bytes = Arc::new(bytes);
        let identity = blocking({
            let bytes = Arc::clone(&bytes);
            move || identify(&bytes)
        })
        .await?;
        yield IngestEvent::Identified(identity.clone());

        if let Some(existing) = store.get_metadata(&identity).await.or_raise(|| ErrorKind::Store)? {
            tracing::info!(identity = %identity.short(), accounts = existing.account_count, "Dataset already ingested");
            yield IngestEvent::CacheHit;
            yield finished(IngestOutcome::Cached { identity, account_count: existing.account_count });
            return;
        }
        if cancel.is_cancelled() {
            yield finished(IngestOutcome::Cancelled);
            return;
        }

        // The archive bytes are released once parsing is done.
        let Extraction { discovery, lists, mut warnings } = blocking(move || extract(&bytes)).await?;
        let Some(discovery) = discovery else {
            yield failed(warnings, None);
            return;
        };
        yield IngestEvent::Discovered(discovery.clone());
        if warnings.iter().any(ParseWarning::is_error) {
            yield failed(warnings, Some(discovery));
            return;
        }

        let total: usize = lists.iter().map(|(_, entries)| entries.len()).sum();
        let mut merger = Merger::default();
        let mut processed = 0;
        for (file, entries) in &lists {
            for batch in entries.chunks(batch_size) {
                merger.merge(*file, batch);
                processed += batch.len();
                yield IngestEvent::Progress(Progress { stage: Stage::Merging, processed, total });
                tokio::task::yield_now().await;
                if cancel.is_cancelled() {
                    tracing::info!(identity = %identity.short(), processed, "Ingestion cancelled while merging");
                    yield finished(IngestOutcome::Cancelled);
                    return;
                }
            }
        }
        drop(lists);
        tracing::debug!(entries = total, accounts = merger.len(), "Merged relationship lists");
        let (records, stats) = merger.finish();

        if records.len() < options.min_accounts {
            warnings.push(
                ParseWarning::error(
                    WarningCode::InsufficientData,
                    format!("Found {} accounts, but at least {} are needed.", records.len(), options.min_accounts),
                )
                .with_fix("Check that the export includes your followers and following lists."),
            );
            yield failed(warnings, Some(discovery));
            return;
        }

        // Leftovers from an earlier, interrupted attempt.
        store.delete_dataset(&identity).await.or_raise(|| ErrorKind::Store)?;
        let total = records.len();
        for (n, batch) in records.chunks(batch_size).enumerate() {
            let start = n * batch_size;
            let written = store.put_account_range(&identity, start, batch).await;
            if written.is_err() {
                purge(store, &identity).await;
            }
            written.or_raise(|| ErrorKind::Store)?;
            tracing::trace!(identity = %identity.short(), start, count = batch.len(), "Batch committed");
            yield IngestEvent::Progress(Progress { stage: Stage::Persisting, processed: start + batch.len(), total });
            tokio::task::yield_now().await;
            if cancel.is_cancelled() {
                tracing::info!(identity = %identity.short(), written = start + batch.len(), "Ingestion cancelled while persisting");
                purge(store, &identity).await;
                yield finished(IngestOutcome::Cancelled);
                return;
            }
        }

        let account_count = total as u64;
        let metadata = DatasetMetadata {
            identity: identity.clone(),
            display_name: name,
            byte_size,
            ingested_at: UtcDateTime::now(),
            account_count,
        };
        let mut committed = store.put_badge_stats(&identity, &stats).await;
        if committed.is_ok() {
            // Written last: from here on the dataset is visible to readers.
            committed = store.put_metadata(&metadata).await;
        }
        if committed.is_err() {
            purge(store, &identity).await;
        }
        committed.or_raise(|| ErrorKind::Store)?;

        tracing::info!(identity = %identity.short(), accounts = account_count, warnings = warnings.len(), "Dataset ingested");
        ParseWarning::sort(&mut warnings);
        yield finished(IngestOutcome::Completed { identity, account_count, discovery, warnings });
    }
}

/// Ingest an archive, calling `on_progress` between batches.
///
/// Convenience wrapper around [`ingest_stream`] for callers that only care
/// about the outcome.
#[instrument(skip(store, archive, options, on_progress, cancel), fields(name = %archive.name, size = archive.bytes.len()))]
pub async fn ingest(
    store: &StoreHandle,
    archive: RawArchive,
    options: IngestOptions,
    mut on_progress: impl FnMut(Progress),
    cancel: &CancellationToken,
) -> Result<IngestOutcome> {
    let mut events = pin!(ingest_stream(store, archive, options, cancel.clone()));
    while let Some(event) = events.next().await {
        match event? {
            IngestEvent::Progress(progress) => on_progress(progress),
            IngestEvent::Complete(outcome) => return Ok(*outcome),
            _ => {},
        }
    }
    // The stream only ends early by yielding an error, handled above.
    exn::bail!(ErrorKind::Task)
}
