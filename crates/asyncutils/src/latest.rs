use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Issues monotonically increasing [`Ticket`]s.
///
/// Issuing a new ticket supersedes every ticket issued before it. Clones share
/// the same counter.
#[derive(Debug, Clone, Default)]
pub struct Latest {
    current: Arc<AtomicU64>,
}

impl Latest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        let id = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket { id, current: Arc::clone(&self.current) }
    }

    /// Supersede all outstanding tickets without issuing a usable one (for
    /// example on teardown).
    pub fn invalidate(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }
}

/// Proof that a request was the latest at the time it was issued.
#[derive(Debug)]
pub struct Ticket {
    id: u64,
    current: Arc<AtomicU64>,
}

impl Ticket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.id
    }

    /// Await `fut`, then hand back its output only if no newer ticket was
    /// issued in the meantime.
    pub async fn run<F: Future>(self, fut: F) -> Option<F::Output> {
        let output = fut.await;
        self.is_current().then_some(output)
    }
}
