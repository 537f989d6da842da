//! Filter engine hosted on a dedicated thread.
//!
//! The thread owns a single-threaded runtime and an [`InlineEngine`]. Callers
//! talk to it only through request/response messages, so a slow scan never
//! occupies the caller's runtime.

use crate::FilterEngine;
use crate::error::{ErrorKind, Result};
use crate::inline::InlineEngine;
use async_trait::async_trait;
use exn::ResultExt;
use rollcall_archive::DatasetIdentity;
use rollcall_extract::models::{BadgeSet, BadgeStats};
use rollcall_store::StoreHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, mpsc as std_mpsc};
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const THREAD_NAME: &str = "rollcall-filter";
// How long the capability probe waits for the thread's runtime to come up.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug)]
enum Op {
    Initialize { identity: DatasetIdentity, total_accounts: usize },
    Filter { query: String, badges: BadgeSet },
    Stats,
    Reset,
}

impl Op {
    fn name(&self) -> &'static str {
        match self {
            Op::Initialize { .. } => "initialize",
            Op::Filter { .. } => "filter",
            Op::Stats => "stats",
            Op::Reset => "reset",
        }
    }
}

#[derive(Debug)]
enum Reply {
    Done,
    Indices(Vec<usize>),
    Stats(BadgeStats),
}

type Response = std::result::Result<Reply, ErrorKind>;

struct Request {
    op: Op,
    reply: oneshot::Sender<Response>,
}

/// [`FilterEngine`] that forwards every call to a worker thread.
pub struct WorkerEngine {
    sender: Mutex<Option<mpsc::UnboundedSender<Request>>>,
    ready: AtomicBool,
    timeout: Duration,
}

impl WorkerEngine {
    /// Start the worker thread and wait for it to report in.
    ///
    /// Fails with [`WorkerUnavailable`](ErrorKind::WorkerUnavailable) if the
    /// thread or its runtime can't be created; callers treat that as "no
    /// isolated context on this platform".
    pub fn spawn(store: StoreHandle, timeout: Duration) -> Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);
        thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || worker_loop(store, receiver, ready_tx))
            .or_raise(|| ErrorKind::WorkerUnavailable)?;
        match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
            Ok(true) => {},
            Ok(false) => exn::bail!(ErrorKind::WorkerUnavailable),
            Err(err) => return Err(err).or_raise(|| ErrorKind::WorkerUnavailable),
        }
        tracing::debug!(thread = THREAD_NAME, "Filter worker started");
        Ok(Self { sender: Mutex::new(Some(sender)), ready: AtomicBool::new(false), timeout })
    }

    async fn request(&self, op: Op) -> Result<Reply> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let Some(sender) = sender else {
            exn::bail!(ErrorKind::WorkerUnavailable);
        };
        let name = op.name();
        let (reply, response) = oneshot::channel();
        if sender.send(Request { op, reply }).is_err() {
            self.ready.store(false, Ordering::SeqCst);
            exn::bail!(ErrorKind::WorkerCrashed);
        }
        match tokio::time::timeout(self.timeout, response).await {
            Err(elapsed) => {
                tracing::warn!(op = name, timeout = ?self.timeout, "Filter worker did not answer in time");
                Err(elapsed).or_raise(|| ErrorKind::Timeout)
            },
            // The reply channel was dropped unanswered: the thread unwound.
            Ok(Err(dropped)) => {
                self.ready.store(false, Ordering::SeqCst);
                tracing::warn!(op = name, "Filter worker crashed");
                Err(dropped).or_raise(|| ErrorKind::WorkerCrashed)
            },
            Ok(Ok(Ok(reply))) => Ok(reply),
            Ok(Ok(Err(kind))) => exn::bail!(kind),
        }
    }
}

fn worker_loop(store: StoreHandle, mut receiver: mpsc::UnboundedReceiver<Request>, ready: std_mpsc::SyncSender<bool>) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::warn!(%error, "Could not build the filter worker runtime");
            let _ = ready.send(false);
            return;
        },
    };
    let _ = ready.send(true);
    let engine = InlineEngine::new(store);
    runtime.block_on(async move {
        while let Some(Request { op, reply }) = receiver.recv().await {
            let response = match op {
                Op::Initialize { identity, total_accounts } => {
                    engine.initialize(&identity, total_accounts).await.map(|()| Reply::Done)
                },
                Op::Filter { query, badges } => engine.filter_to_indices(&query, badges).await.map(Reply::Indices),
                Op::Stats => engine.get_stats().await.map(Reply::Stats),
                Op::Reset => engine.reset().await.map(|()| Reply::Done),
            };
            // The requester may have timed out and gone away.
            let _ = reply.send(response.map_err(|err| (*err).clone()));
        }
        engine.dispose().await;
    });
    tracing::debug!(thread = THREAD_NAME, "Filter worker stopped");
}

fn unexpected(reply: Reply) -> ErrorKind {
    tracing::error!(?reply, "Filter worker sent a reply of the wrong kind");
    ErrorKind::WorkerCrashed
}

#[async_trait]
impl FilterEngine for WorkerEngine {
    async fn initialize(&self, identity: &DatasetIdentity, total_accounts: usize) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);
        match self.request(Op::Initialize { identity: identity.clone(), total_accounts }).await? {
            Reply::Done => {
                self.ready.store(true, Ordering::SeqCst);
                Ok(())
            },
            other => exn::bail!(unexpected(other)),
        }
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn filter_to_indices(&self, query: &str, badges: BadgeSet) -> Result<Vec<usize>> {
        match self.request(Op::Filter { query: query.to_string(), badges }).await? {
            Reply::Indices(indices) => Ok(indices),
            other => exn::bail!(unexpected(other)),
        }
    }

    async fn get_stats(&self) -> Result<BadgeStats> {
        match self.request(Op::Stats).await? {
            Reply::Stats(stats) => Ok(stats),
            other => exn::bail!(unexpected(other)),
        }
    }

    async fn reset(&self) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);
        match self.request(Op::Reset).await? {
            Reply::Done => Ok(()),
            other => exn::bail!(unexpected(other)),
        }
    }

    /// Closes the request channel; the thread finishes its current request
    /// and exits.
    async fn dispose(&self) {
        self.ready.store(false, Ordering::SeqCst);
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}
