//! Completion latches and the shared termination signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::Notify;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::error;

use artvec_core::error::PipelineError;

/// A one-way flag: initially unset, set at most once, observable by any
/// number of waiters.
#[derive(Debug, Default)]
pub struct Latch {
    set: AtomicBool,
    notify: Notify,
}

impl Latch {
    pub fn new() -> Self { Self::default() }

    /// Sets the latch. Returns `true` only for the call that actually flipped it.
    pub fn set(&self) -> bool {
        if self.set.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    pub fn is_set(&self) -> bool { self.set.load(Ordering::Acquire) }

    /// Resolves once the latch is set.
    pub async fn wait(&self) {
        loop {
            // register before checking so a concurrent `set` cannot be missed
            let notified = self.notify.notified();
            if self.is_set() { return; }
            notified.await;
        }
    }

    /// Returns a guard that sets the latch when dropped, on every exit path.
    pub fn guard(&self) -> LatchGuard<'_> { LatchGuard(self) }
}

pub struct LatchGuard<'a>(&'a Latch);

impl Drop for LatchGuard<'_> {
    fn drop(&mut self) { self.0.set(); }
}

/// The three completion latches of one run. Each has exactly one writer:
/// the fetch task, the embed coordinator and the persist task respectively.
#[derive(Debug, Default)]
pub struct Signals {
    pub fetch_complete: Latch,
    pub embed_complete: Latch,
    pub all_persisted: Latch,
}

impl Signals {
    /// True once fetch, embed and persist have all signalled completion.
    pub fn all_set(&self) -> bool {
        self.fetch_complete.is_set() && self.embed_complete.is_set() && self.all_persisted.is_set()
    }
}

/// Termination signal shared by every stage of a run.
///
/// The first unrecoverable error is recorded; later ones are only logged.
#[derive(Debug, Clone)]
pub struct Shutdown {
    token: CancellationToken,
    first: Arc<OnceLock<PipelineError>>,
}

impl Shutdown {
    pub fn new(token: CancellationToken) -> Self {
        Self { token, first: Arc::new(OnceLock::new()) }
    }

    /// Records `err` (if it is the first) and terminates the run.
    pub fn fail(&self, err: PipelineError) -> bool {
        let first = self.first.set(err.clone()).is_ok();
        if first {
            error!(error = %err, "Pipeline terminating");
        } else {
            error!(error = %err, "Further pipeline error after termination");
        }
        self.token.cancel();
        first
    }

    pub fn failure(&self) -> Option<PipelineError> { self.first.get().cloned() }

    pub fn is_terminated(&self) -> bool { self.token.is_cancelled() }

    pub fn terminated(&self) -> WaitForCancellationFuture<'_> { self.token.cancelled() }

    pub fn token(&self) -> &CancellationToken { &self.token }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn latch_is_set_once() {
        let latch = Latch::new();
        assert!(!latch.is_set());
        assert!(latch.set());
        assert!(!latch.set());
        assert!(latch.is_set());
    }

    #[test]
    fn guard_sets_on_drop() {
        let latch = Latch::new();
        {
            let _g = latch.guard();
            assert!(!latch.is_set());
        }
        assert!(latch.is_set());
    }

    #[tokio::test]
    async fn waiters_wake_on_set() {
        let latch = Arc::new(Latch::new());
        let waiter = tokio::spawn({
            let latch = latch.clone();
            async move { latch.wait().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        latch.set();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        // already set: returns immediately
        latch.wait().await;
    }

    #[test]
    fn signals_complete_only_when_every_latch_is_set() {
        let signals = Signals::default();
        signals.fetch_complete.set();
        signals.embed_complete.set();
        assert!(!signals.all_set());
        drop(signals.all_persisted.guard());
        assert!(signals.all_set());
    }

    #[test]
    fn first_failure_wins() {
        let shutdown = Shutdown::new(CancellationToken::new());
        assert!(shutdown.fail(PipelineError::Storage("disk full".into())));
        assert!(!shutdown.fail(PipelineError::Cancelled));
        assert!(shutdown.is_terminated());
        assert_eq!(shutdown.failure(), Some(PipelineError::Storage("disk full".into())));
    }

    #[test]
    fn child_token_follows_parent() {
        let parent = CancellationToken::new();
        let shutdown = Shutdown::new(parent.child_token());
        parent.cancel();
        assert!(shutdown.is_terminated());
        assert_eq!(shutdown.failure(), None);
    }
}
