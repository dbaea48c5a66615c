//! Handoff queue between pipeline stages
//!
//! A thread-safe FIFO plus a `producing` flag. Consumers stop only when the
//! queue is empty *and* nobody is producing; an empty queue alone just means
//! the producer hasn't caught up yet.
//!
//! Items and the flag share one mutex, and every change that can unblock a
//! waiter notifies the condvar while that state is consistent, so a waiter
//! cannot miss a push or a `stop_producing`.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Queue contents guarded by the mutex
struct QueueState<T> {
    items: VecDeque<T>,
    producing: bool,
}

/// Unbounded FIFO with an explicit producing/draining state
pub struct HandoffQueue<T> {
    state: Mutex<QueueState<T>>,
    condvar: Condvar,
}

impl<T> HandoffQueue<T> {
    /// Create an empty queue that is not yet producing
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                producing: false,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Append an item and wake one waiter
    pub fn push(&self, item: T) {
        self.lock().items.push_back(item);
        self.condvar.notify_one();
    }

    /// Pop the oldest item without blocking
    pub fn try_pop(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    /// Pop the oldest item, blocking while the queue is empty and producing
    ///
    /// Returns `None` only when the queue is empty and production has stopped,
    /// which is final: no item will ever appear after that.
    pub fn wait_pop(&self) -> Option<T> {
        let mut state = self.lock();
        while state.items.is_empty() && state.producing {
            state = self
                .condvar
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn is_producing(&self) -> bool {
        self.lock().producing
    }

    /// Mark the queue as producing and wake all waiters
    pub fn start_producing(&self) {
        self.lock().producing = true;
        self.condvar.notify_all();
    }

    /// Mark production finished and wake all waiters so they can drain and exit
    pub fn stop_producing(&self) {
        self.lock().producing = false;
        self.condvar.notify_all();
    }

    /// `start_producing` now, `stop_producing` when the guard drops
    ///
    /// A producer holding the guard releases its consumers on every exit path,
    /// including early returns and panics.
    pub fn producing_guard(&self) -> ProducingGuard<'_, T> {
        self.start_producing();
        ProducingGuard { queue: self }
    }

    // Queue state stays consistent across a panicking holder (every mutation
    // is a single VecDeque or bool operation), so a poisoned lock is usable.
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for HandoffQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Stops production on the borrowed queue when dropped
pub struct ProducingGuard<'a, T> {
    queue: &'a HandoffQueue<T>,
}

impl<T> ProducingGuard<'_, T> {
    pub fn queue(&self) -> &HandoffQueue<T> {
        self.queue
    }
}

impl<T> Drop for ProducingGuard<'_, T> {
    fn drop(&mut self) {
        self.queue.stop_producing();
    }
}
