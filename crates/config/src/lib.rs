//! Layered configuration.
//!
//! Sources are merged in order, later ones winning:
//!
//! 1. compiled defaults,
//! 2. `config.toml`, `config.yaml` and `config.json` in the platform
//!    configuration directory (each optional),
//! 3. an explicit file given by the caller (must exist),
//! 4. environment variables prefixed `ROLLCALL_`, with nested keys separated
//!    by a double underscore (`ROLLCALL_WINDOW__MAX_SLICES=40`).
//!
//! ```toml
//! [database]
//! path = "/var/lib/rollcall/rollcall.sqlite3"
//!
//! [ingest]
//! batch_size = 500
//! min_accounts = 1
//!
//! [window]
//! slice_size = 100
//! max_slices = 20
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

const ENV_PREFIX: &str = "ROLLCALL_";
const DATABASE_FILE: &str = "rollcall.sqlite3";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "rollcall")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
    pub filter: FilterConfig,
    pub window: WindowConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = project_dirs()
            .map(|dirs| dirs.data_dir().join(DATABASE_FILE))
            .unwrap_or_else(|| PathBuf::from(DATABASE_FILE));
        Self { path }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Accounts merged and written per batch; cancellation is checked between
    /// batches.
    pub batch_size: usize,
    /// Fewer unified accounts than this fails ingestion.
    pub min_accounts: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { batch_size: 500, min_accounts: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Run the filter engine on its own thread when possible.
    pub worker: bool,
    pub request_timeout_ms: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { worker: true, request_timeout_ms: 10_000 }
    }
}

impl FilterConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub slice_size: usize,
    pub max_slices: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { slice_size: 100, max_slices: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub debounce_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Config {
    /// Load the configuration from every source (see the module docs).
    #[instrument(skip_all, fields(explicit = ?explicit))]
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_dir = project_dirs().map(|dirs| dirs.config_dir().to_path_buf());
        Self::load_from(config_dir.as_deref(), explicit)
    }

    fn load_from(config_dir: Option<&Path>, explicit: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(dir) = config_dir {
            figment = figment
                .merge(Toml::file(dir.join("config.toml")))
                .merge(Yaml::file(dir.join("config.yaml")))
                .merge(Json::file(dir.join("config.json")));
        }
        if let Some(path) = explicit {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound);
            }
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(&figment)
    }

    /// Extract and validate a configuration from an already assembled figment.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(?config, "Configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ingest.batch_size == 0 {
            exn::bail!(ErrorKind::Invalid("ingest.batch_size"));
        }
        if self.window.slice_size == 0 {
            exn::bail!(ErrorKind::Invalid("window.slice_size"));
        }
        if self.window.max_slices == 0 {
            exn::bail!(ErrorKind::Invalid("window.max_slices"));
        }
        if self.filter.request_timeout_ms == 0 {
            exn::bail!(ErrorKind::Invalid("filter.request_timeout_ms"));
        }
        Ok(())
    }
}
