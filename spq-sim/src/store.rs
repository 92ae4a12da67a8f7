use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// ---

use tokio::sync::Notify;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Blocking FIFO channel of the simulation substrate.
///
/// `put` is immediate and never suspends; `get` suspends the calling process
/// until an item exists. Clones are handles to the same FIFO, so a store can
/// be handed to a neighbouring element which later takes items out of it
/// with [`Store::remove_first`].
#[derive(Debug)]
pub struct Store<T> {
    // ---
    items: Arc<Mutex<VecDeque<T>>>,
    available: Arc<Notify>,
}

// ---

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            available: Arc::clone(&self.available),
        }
    }
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---

impl<T> Store<T> {
    // ---
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(VecDeque::new())),
            available: Arc::new(Notify::new()),
        }
    }

    // ---

    /// Append an item at the tail and wake one suspended getter.
    pub fn put(&self, item: T) {
        // ---
        self.lock().push_back(item);
        self.available.notify_one();
    }

    // ---

    /// Remove the head item, suspending until one exists.
    ///
    /// Returns without suspending when the store is already non-empty.
    pub async fn get(&self) -> T {
        // ---
        loop {
            if let Some(item) = self.lock().pop_front() {
                return item;
            }
            self.available.notified().await;
        }
    }

    // ---

    /// Remove the head item if there is one. Never suspends.
    pub fn try_get(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Remove the first item matching `pred`, wherever it sits. Never
    /// suspends; items ahead of it keep their order.
    pub fn remove_first(&self, pred: impl FnMut(&T) -> bool) -> Option<T> {
        // ---
        let mut items = self.lock();
        let at = items.iter().position(pred)?;
        items.remove(at)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // ---

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[tokio::test]
    async fn items_come_out_in_fifo_order() {
        // ---
        let store = Store::new();
        store.put(1);
        store.put(2);
        store.put(3);

        assert_eq!(store.len(), 3);
        assert_eq!(store.get().await, 1);
        assert_eq!(store.try_get(), Some(2));
        assert_eq!(store.get().await, 3);
        assert!(store.is_empty());
        assert_eq!(store.try_get(), None);
    }

    // ---

    #[tokio::test(start_paused = true)]
    async fn get_suspends_until_put() {
        // ---
        let store: Store<&'static str> = Store::new();
        let getter = {
            let store = store.clone();
            tokio::spawn(async move { store.get().await })
        };

        tokio::task::yield_now().await;
        assert!(!getter.is_finished(), "get must suspend on an empty store");

        store.put("pkt");
        assert_eq!(getter.await.expect("getter panicked"), "pkt");
    }

    // ---

    #[test]
    fn remove_first_takes_a_match_from_mid_queue() {
        // ---
        let store = Store::new();
        for item in [1, 2, 3, 2] {
            store.put(item);
        }

        assert_eq!(store.remove_first(|&i| i == 2), Some(2));
        assert_eq!(store.remove_first(|&i| i == 9), None);
        assert_eq!(store.len(), 3);
        assert_eq!(store.try_get(), Some(1));
        assert_eq!(store.try_get(), Some(3));
        assert_eq!(store.try_get(), Some(2));
    }

    // ---

    #[test]
    fn clones_share_one_fifo() {
        // ---
        let a = Store::new();
        let b = a.clone();
        a.put(10);

        assert_eq!(b.try_get(), Some(10));
        assert!(a.is_empty());
    }
}
