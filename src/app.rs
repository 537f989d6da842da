use crate::report::IntoReport;
use miette::IntoDiagnostic;
use rollcall_config::Config;
use rollcall_extract::models::DatasetMetadata;
use rollcall_filter::FallbackEngine;
use rollcall_ingest::IngestOptions;
use rollcall_store::{Database, SqliteStore, StoreHandle};
use rollcall_window::{WindowOptions, WindowedSource};
use std::sync::Arc;

/// Everything a command needs: configuration and an open store.
pub(crate) struct App {
    pub(crate) config: Config,
    pub(crate) store: StoreHandle,
    database: Database,
}

impl App {
    pub(crate) async fn open(config: Config) -> miette::Result<Self> {
        let database = Database::connect(&config.database.path).await.into_report()?;
        tracing::debug!(path = %config.database.path.display(), "Database open");
        let store: StoreHandle = Arc::new(SqliteStore::from(&database));
        Ok(Self { config, store, database })
    }

    pub(crate) fn ingest_options(&self) -> IngestOptions {
        IngestOptions { batch_size: self.config.ingest.batch_size, min_accounts: self.config.ingest.min_accounts }
    }

    pub(crate) fn engine(&self) -> Arc<FallbackEngine> {
        Arc::new(FallbackEngine::new(
            self.store.clone(),
            self.config.filter.worker,
            self.config.filter.request_timeout(),
        ))
    }

    pub(crate) fn window(&self) -> miette::Result<WindowedSource> {
        let options =
            WindowOptions { slice_size: self.config.window.slice_size, max_slices: self.config.window.max_slices };
        WindowedSource::new(self.store.clone(), options).into_report()
    }

    /// Find the dataset whose identity starts with `reference`.
    ///
    /// Returns its metadata and account count.
    pub(crate) async fn resolve(&self, reference: &str) -> miette::Result<(DatasetMetadata, usize)> {
        let needle = reference.trim().to_ascii_lowercase();
        if needle.is_empty() {
            miette::bail!("a dataset identity is required");
        }
        let datasets = self.store.list_datasets().await.into_report()?;
        let mut matches = datasets.into_iter().filter(|metadata| metadata.identity.as_str().starts_with(&needle));
        match (matches.next(), matches.next()) {
            (Some(metadata), None) => {
                let total = usize::try_from(metadata.account_count).into_diagnostic()?;
                Ok((metadata, total))
            },
            (None, _) => Err(miette::miette!(
                help = "run `rollcall datasets` to see what has been ingested",
                "no dataset matches `{reference}`"
            )),
            (Some(_), Some(_)) => Err(miette::miette!(
                help = "use more characters of the identity",
                "`{reference}` matches more than one dataset"
            )),
        }
    }

    pub(crate) async fn close(self) {
        self.database.close().await;
    }
}
