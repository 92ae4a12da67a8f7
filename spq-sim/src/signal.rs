use std::sync::Arc;

// ---

use tokio::sync::Notify;

// ---------------------------------------------------------------------------
// WorkSignal
// ---------------------------------------------------------------------------

/// Single-slot "work available" condition.
///
/// [`WorkSignal::signal`] wakes the waiting process, or, when nobody is
/// waiting yet, leaves one pending permit for the next [`WorkSignal::wait`].
/// Signals never accumulate beyond that one permit, so a burst of arrivals
/// while the waiter is busy costs it at most one spurious wakeup.
#[derive(Debug, Clone, Default)]
pub struct WorkSignal {
    // ---
    notify: Arc<Notify>,
}

// ---

impl WorkSignal {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake the waiter, or arm the single pending permit.
    pub fn signal(&self) {
        self.notify.notify_one();
    }

    /// Suspend until signalled. Consumes a pending permit if one is armed.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use std::time::Duration;

    use super::*;

    // ---

    #[tokio::test(start_paused = true)]
    async fn signal_before_wait_is_not_lost() {
        // ---
        let signal = WorkSignal::new();
        signal.signal();

        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("pending permit must satisfy the next wait");
    }

    // ---

    #[tokio::test(start_paused = true)]
    async fn repeated_signals_coalesce_into_one_permit() {
        // ---
        let signal = WorkSignal::new();
        signal.signal();
        signal.signal();
        signal.signal();

        signal.wait().await;

        let second = tokio::time::timeout(Duration::from_secs(1), signal.wait()).await;
        assert!(second.is_err(), "only one permit may be pending");
    }

    // ---

    #[tokio::test(start_paused = true)]
    async fn signal_wakes_suspended_waiter() {
        // ---
        let signal = WorkSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        signal.signal();
        waiter.await.expect("waiter panicked");
    }
}
