use crate::app::App;
use crate::browse::visible_rows;
use crate::report::{self, IntoReport};
use futures::StreamExt;
use miette::{IntoDiagnostic, WrapErr};
use rollcall_extract::models::{AccountRecord, BadgeKey, BadgeSet};
use rollcall_filter::FilterEngine;
use rollcall_ingest::{IngestEvent, IngestOutcome, Progress, RawArchive, Stage, ingest_stream};
use std::path::Path;
use std::pin::pin;
use time::format_description::well_known::Rfc3339;
use tokio_util::sync::CancellationToken;

pub(crate) async fn ingest(app: &App, path: &Path) -> miette::Result<()> {
    let bytes = tokio::fs::read(path).await.into_diagnostic().wrap_err_with(|| format!("reading {}", path.display()))?;
    let name = path.file_name().map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling ingestion");
                cancel.cancel();
            }
        }
    });

    let mut events = pin!(ingest_stream(&app.store, RawArchive::new(name, bytes), app.ingest_options(), cancel));
    let mut meter = ProgressMeter::default();
    let mut outcome = None;
    while let Some(event) = events.next().await {
        match event.into_report()? {
            IngestEvent::Started => {},
            IngestEvent::Identified(identity) => tracing::debug!(identity = %identity, "Archive identified"),
            IngestEvent::CacheHit => eprintln!("Archive already ingested"),
            IngestEvent::Discovered(discovery) => {
                for file in discovery.files.iter().filter(|file| file.found) {
                    eprintln!("found {} ({} entries)", file.name(), file.item_count.unwrap_or_default());
                }
            },
            IngestEvent::Progress(progress) => meter.update(progress),
            IngestEvent::Complete(complete) => outcome = Some(*complete),
        }
    }
    interrupt.abort();

    let Some(outcome) = outcome else {
        miette::bail!("ingestion ended without an outcome");
    };
    for warning in outcome.warnings() {
        eprintln!("{}", report::warning_line(warning));
    }
    match &outcome {
        IngestOutcome::Completed { identity, account_count, .. } => {
            println!("{identity}\t{account_count} accounts");
            Ok(())
        },
        IngestOutcome::Cached { identity, account_count } => {
            println!("{identity}\t{account_count} accounts (cached)");
            Ok(())
        },
        IngestOutcome::Failed { .. } => match outcome.primary_warning() {
            Some(warning) => Err(report::failure(warning)),
            None => miette::bail!("ingestion failed"),
        },
        IngestOutcome::Cancelled => {
            eprintln!("Cancelled, nothing was saved");
            Ok(())
        },
    }
}

/// Prints ingestion progress at most once per stage and ten percent.
#[derive(Default)]
struct ProgressMeter {
    last: Option<(Stage, usize)>,
}

impl ProgressMeter {
    fn update(&mut self, progress: Progress) {
        let decile = (progress.processed * 10).checked_div(progress.total).unwrap_or(10);
        if self.last == Some((progress.stage, decile)) {
            return;
        }
        self.last = Some((progress.stage, decile));
        let stage = match progress.stage {
            Stage::Merging => "merging",
            Stage::Persisting => "saving",
        };
        eprintln!("{stage} {}/{}", progress.processed, progress.total);
    }
}

pub(crate) async fn datasets(app: &App) -> miette::Result<()> {
    let datasets = app.store.list_datasets().await.into_report()?;
    if datasets.is_empty() {
        eprintln!("No datasets yet, run `rollcall ingest <archive>`");
    }
    for metadata in datasets {
        let ingested_at = metadata.ingested_at.format(&Rfc3339).into_diagnostic()?;
        println!("{}\t{}\t{} accounts\t{}", metadata.identity.short(), ingested_at, metadata.account_count, metadata.display_name);
    }
    Ok(())
}

pub(crate) async fn stats(app: &App, reference: &str) -> miette::Result<()> {
    let (metadata, total) = app.resolve(reference).await?;
    let engine = app.engine();
    engine.initialize(&metadata.identity, total).await.into_report()?;
    let stats = engine.get_stats().await.into_report()?;
    engine.dispose().await;
    println!("{:<20} {total}", "accounts");
    for (badge, count) in stats.iter() {
        println!("{:<20} {count}", badge.as_str());
    }
    Ok(())
}

pub(crate) fn parse_badges<S: AsRef<str>>(names: &[S]) -> miette::Result<BadgeSet> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            name.parse::<BadgeKey>().map_err(|_| {
                let known: Vec<&str> = BadgeKey::ALL.iter().map(|badge| badge.as_str()).collect();
                miette::miette!(help = format!("known badges: {}", known.join(", ")), "unknown badge `{name}`")
            })
        })
        .collect()
}

pub(crate) async fn search(
    app: &App,
    reference: &str,
    query: &str,
    badges: &[String],
    limit: usize,
    offset: usize,
) -> miette::Result<()> {
    let badges = parse_badges(badges)?;
    let (metadata, total) = app.resolve(reference).await?;
    let engine = app.engine();
    engine.initialize(&metadata.identity, total).await.into_report()?;
    let indices = engine.filter_to_indices(query, badges).await.into_report()?;
    engine.dispose().await;

    let window = app.window()?;
    window.set_dataset(&metadata.identity, total);
    let page: Vec<usize> = indices.iter().copied().skip(offset).take(limit).collect();
    for record in window.get_by_indices(&page).await {
        print_record(&record);
    }
    eprintln!("{} of {} matching accounts", page.len(), indices.len());
    Ok(())
}

pub(crate) async fn list(app: &App, reference: &str, limit: usize, offset: usize) -> miette::Result<()> {
    let (metadata, total) = app.resolve(reference).await?;
    let window = app.window()?;
    window.set_dataset(&metadata.identity, total);
    let visible: Vec<usize> = (offset..offset.saturating_add(limit).min(total)).collect();
    let rows = visible_rows(&window, &visible, app.config.filter.request_timeout()).await;
    for (index, row) in visible.iter().zip(rows) {
        match row {
            Some(record) => print_record(&record),
            None => println!("{index:>8}  <unavailable>"),
        }
    }
    Ok(())
}

pub(crate) async fn forget(app: &App, reference: &str) -> miette::Result<()> {
    let (metadata, _) = app.resolve(reference).await?;
    app.store.delete_dataset(&metadata.identity).await.into_report()?;
    eprintln!("Forgot {} ({})", metadata.identity.short(), metadata.display_name);
    Ok(())
}

pub(crate) fn print_record(record: &AccountRecord) {
    println!("{:>8}  {:<32} {}", record.index, record.username, record.badges);
}
