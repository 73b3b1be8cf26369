//! Thread-safe FIFO with a blocking wait and an atomic bulk drain.
//!
//! Producers append with [`EventQueue::enqueue`]; the single consumer parks
//! in [`EventQueue::wait`] and takes everything queued so far in one step
//! with [`EventQueue::detach_all`]. All structural mutation happens under one
//! mutex. Each enqueue wakes at most one waiter, so the queue is meant for a
//! single consumer; [`EventQueue::close`] is the only broadcast wake.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct EventQueue<T> {
    inner: Mutex<Inner<T>>,
    signal: Condvar,
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            signal: Condvar::new(),
        }
    }

    /// Append at the tail and wake one waiter.
    pub fn enqueue(&self, item: T) {
        let mut inner = self.inner.lock();
        inner.items.push_back(item);
        self.signal.notify_one();
    }

    /// Remove the head without blocking. `None` means empty.
    pub fn dequeue(&self) -> Option<T> {
        self.inner.lock().items.pop_front()
    }

    /// Block until the queue holds at least one item or has been closed.
    ///
    /// Returns immediately when items are already present. Returns `true` if
    /// items are available, `false` if the queue was closed while empty.
    pub fn wait(&self) -> bool {
        let mut inner = self.inner.lock();
        while inner.items.is_empty() && !inner.closed {
            self.signal.wait(&mut inner);
        }
        !inner.items.is_empty()
    }

    /// Like [`wait`](Self::wait), giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut inner = self.inner.lock();
        if inner.items.is_empty() && !inner.closed {
            // One bounded wait; a spurious wakeup just reports the current state.
            let _ = self.signal.wait_for(&mut inner, timeout);
        }
        !inner.items.is_empty()
    }

    /// Take the whole current contents, leaving the queue empty.
    pub fn detach_all(&self) -> Vec<T> {
        let mut inner = self.inner.lock();
        std::mem::take(&mut inner.items).into()
    }

    /// Append an already-ordered list at the tail, keeping its order.
    pub fn attach(&self, items: impl IntoIterator<Item = T>) {
        let mut inner = self.inner.lock();
        let before = inner.items.len();
        inner.items.extend(items);
        if inner.items.len() > before {
            self.signal.notify_one();
        }
    }

    /// Drop everything still queued without handing it to anyone.
    ///
    /// Returns how many items were discarded. Calling it on an empty queue
    /// is a no-op.
    pub fn discard_pending(&self) -> usize {
        let drained = self.detach_all();
        drained.len()
    }

    /// Mark the queue closed and wake every waiter.
    ///
    /// Enqueueing still works afterwards; closing only stops `wait` from
    /// blocking on an empty queue.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        self.signal.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
