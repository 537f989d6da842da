mod app;
mod browse;
mod cli;
mod commands;
mod report;

use crate::app::App;
use crate::cli::{Cli, Command};
use crate::report::IntoReport;
use clap::Parser;
use rollcall_config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref()).into_report()?;
    if let Some(path) = cli.database {
        config.database.path = path;
    }
    let app = App::open(config).await?;

    let result = match cli.command {
        Command::Ingest { archive } => commands::ingest(&app, &archive).await,
        Command::Datasets => commands::datasets(&app).await,
        Command::Stats { dataset } => commands::stats(&app, &dataset).await,
        Command::Search { dataset, query, badges, limit, offset } => {
            commands::search(&app, &dataset, &query, &badges, limit, offset).await
        },
        Command::List { dataset, limit, offset } => commands::list(&app, &dataset, limit, offset).await,
        Command::Browse { dataset, page } => browse::browse(&app, &dataset, page).await,
        Command::Forget { dataset } => commands::forget(&app, &dataset).await,
    };
    app.close().await;
    result
}
