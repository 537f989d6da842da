//! Interactive search over one dataset.
//!
//! Plain lines are search queries and are debounced; lines starting with `:`
//! are commands and act immediately. Every search supersedes the previous
//! one, so a slow result never overwrites a newer one.

use crate::app::App;
use crate::commands::{parse_badges, print_record};
use crate::report::IntoReport;
use futures::StreamExt;
use rollcall_asyncutils::{Latest, Ticket, debounce};
use rollcall_extract::models::{AccountRecord, BadgeSet};
use rollcall_filter::{FallbackEngine, FilterEngine};
use rollcall_window::WindowedSource;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const HELP: &str = "\
<text>          search usernames (case-insensitive)
:badge <name>   toggle a badge filter
:clear          clear badge filters
:n / :p         next / previous page
:q              quit";

type FilterResult = rollcall_filter::error::Result<Vec<usize>>;

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Next,
    Previous,
    Toggle(String),
    Clear,
    Help,
    Quit,
    Unknown(String),
}

impl Action {
    fn parse(line: &str) -> Self {
        let mut words = line.trim_start_matches(':').split_whitespace();
        match (words.next(), words.next()) {
            (Some("n" | "next"), None) => Action::Next,
            (Some("p" | "prev"), None) => Action::Previous,
            (Some("b" | "badge"), Some(name)) => Action::Toggle(name.to_string()),
            (Some("clear"), None) => Action::Clear,
            (Some("h" | "help"), None) => Action::Help,
            (Some("q" | "quit"), None) => Action::Quit,
            _ => Action::Unknown(line.to_string()),
        }
    }
}

struct View {
    query: String,
    badges: BadgeSet,
    indices: Vec<usize>,
    offset: usize,
}

/// Resolve `accounts` through the window, waiting for slices to land.
///
/// Rows whose slice doesn't arrive within `patience` of the previous landing
/// come back as `None`.
pub(crate) async fn visible_rows(
    window: &WindowedSource,
    accounts: &[usize],
    patience: Duration,
) -> Vec<Option<AccountRecord>> {
    let mut landed = window.subscribe();
    loop {
        let rows: Vec<Option<AccountRecord>> = accounts.iter().map(|index| window.get_account(*index)).collect();
        if rows.iter().all(Option::is_some) {
            return rows;
        }
        match tokio::time::timeout(patience, landed.changed()).await {
            Ok(Ok(())) => continue,
            _ => return rows,
        }
    }
}

async fn render(window: &WindowedSource, view: &View, page: usize, patience: Duration) {
    let end = view.offset.saturating_add(page).min(view.indices.len());
    let visible = &view.indices[view.offset.min(end)..end];
    let rows = visible_rows(window, visible, patience).await;
    for (index, row) in visible.iter().zip(rows) {
        match row {
            Some(record) => print_record(&record),
            None => println!("{index:>8}  <unavailable>"),
        }
    }
    eprintln!("-- {}..{} of {} [{}] {:?}", view.offset, end, view.indices.len(), view.badges, view.query);
    if let (Some(first), Some(last)) = (visible.first(), visible.last()) {
        window.preload_adjacent(*first, *last + 1);
    }
}

fn submit(
    latest: &Latest,
    engine: &Arc<FallbackEngine>,
    view: &View,
    results: &mpsc::UnboundedSender<(Ticket, FilterResult)>,
) {
    let ticket = latest.issue();
    let engine = Arc::clone(engine);
    let results = results.clone();
    let (query, badges) = (view.query.clone(), view.badges);
    tokio::spawn(async move {
        let outcome = engine.filter_to_indices(&query, badges).await;
        // The loop may already be gone.
        let _ = results.send((ticket, outcome));
    });
}

/// Split stdin into commands and queries until it closes.
async fn read_input(queries: mpsc::UnboundedSender<String>, commands: mpsc::UnboundedSender<String>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                tracing::warn!(%error, "Could not read input");
                break;
            },
        };
        let target = if line.starts_with(':') { &commands } else { &queries };
        if target.send(line).is_err() {
            break;
        }
    }
}

pub(crate) async fn browse(app: &App, reference: &str, page: usize) -> miette::Result<()> {
    let page = page.max(1);
    let (metadata, total) = app.resolve(reference).await?;
    let engine = app.engine();
    engine.initialize(&metadata.identity, total).await.into_report()?;
    let window = app.window()?;
    window.set_dataset(&metadata.identity, total);
    let patience = app.config.filter.request_timeout();
    eprintln!("{} accounts, :help for commands", total);

    let (query_tx, query_rx) = mpsc::unbounded_channel();
    let (command_tx, mut command_rx) = mpsc::unbounded_channel();
    let reader = tokio::spawn(read_input(query_tx, command_tx));
    let queries = futures::stream::unfold(query_rx, |mut rx| async move { rx.recv().await.map(|query| (query, rx)) });
    let mut queries = pin!(debounce(queries, app.config.search.debounce()));

    let latest = Latest::new();
    let (result_tx, mut result_rx) = mpsc::unbounded_channel();
    let mut view = View { query: String::new(), badges: BadgeSet::empty(), indices: Vec::new(), offset: 0 };
    submit(&latest, &engine, &view, &result_tx);

    let mut quit = false;
    loop {
        tokio::select! {
            Some(query) = queries.next() => {
                view.query = query;
                submit(&latest, &engine, &view, &result_tx);
            },
            Some((ticket, outcome)) = result_rx.recv() => {
                if !ticket.is_current() {
                    tracing::debug!(ticket = ticket.id(), "Dropping superseded search result");
                    continue;
                }
                match outcome {
                    Ok(indices) => {
                        view.indices = indices;
                        view.offset = 0;
                        render(&window, &view, page, patience).await;
                    },
                    Err(error) => eprintln!("search failed: {}", *error),
                }
            },
            command = command_rx.recv() => {
                let Some(line) = command else { break };
                match Action::parse(&line) {
                    Action::Next if view.offset + page < view.indices.len() => {
                        view.offset += page;
                        render(&window, &view, page, patience).await;
                    },
                    Action::Next => eprintln!("-- last page"),
                    Action::Previous => {
                        view.offset = view.offset.saturating_sub(page);
                        render(&window, &view, page, patience).await;
                    },
                    Action::Toggle(name) => match parse_badges(&[name]) {
                        Ok(badge) => {
                            view.badges = if view.badges.intersects(badge) {
                                badge.iter().fold(view.badges, |mut set, key| {
                                    set.remove(key);
                                    set
                                })
                            } else {
                                view.badges.union(badge)
                            };
                            submit(&latest, &engine, &view, &result_tx);
                        },
                        Err(report) => eprintln!("{report:?}"),
                    },
                    Action::Clear => {
                        view.badges = BadgeSet::empty();
                        submit(&latest, &engine, &view, &result_tx);
                    },
                    Action::Help => eprintln!("{HELP}"),
                    Action::Quit => {
                        quit = true;
                        break;
                    },
                    Action::Unknown(line) => eprintln!("unknown command `{line}`, :help for commands"),
                }
            },
        }
    }

    // Input ended: apply the last query still waiting out its debounce.
    if !quit {
        let mut pending = None;
        while let Some(query) = queries.next().await {
            pending = Some(query);
        }
        if let Some(query) = pending {
            view.query = query;
            let ticket = latest.issue();
            if let Some(outcome) = ticket.run(engine.filter_to_indices(&view.query, view.badges)).await {
                view.indices = outcome.into_report()?;
                view.offset = 0;
                render(&window, &view, page, patience).await;
            }
        }
    }

    latest.invalidate();
    reader.abort();
    window.dispose();
    engine.dispose().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(":n", Action::Next)]
    #[case(":prev", Action::Previous)]
    #[case(":badge mutuals", Action::Toggle("mutuals".to_string()))]
    #[case(":clear", Action::Clear)]
    #[case(":q", Action::Quit)]
    #[case(":badge", Action::Unknown(":badge".to_string()))]
    #[case(":n 2", Action::Unknown(":n 2".to_string()))]
    fn test_parse_action(#[case] line: &str, #[case] expected: Action) {
        assert_eq!(Action::parse(line), expected);
    }
}
