//! Multi-producer multi-consumer work queue with blocking and non-blocking
//! pops and cooperative shutdown.
//!
//! `stop` marks the queue inactive and wakes every waiter; a blocked
//! `wait_and_pop` then returns `None` once the backlog is drained, which is
//! the signal for worker threads to exit.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, PoisonError};

struct Inner<T> {
    items: VecDeque<T>,
    active: bool,
}

pub struct JobQueue<T> {
    inner: Mutex<Inner<T>>,
    ready: Condvar,
}

impl<T> JobQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { items: VecDeque::new(), active: true }),
            ready: Condvar::new(),
        }
    }

    pub fn push(&self, value: T) {
        let mut inner = self.lock();
        if !inner.active {
            return;
        }
        inner.items.push_back(value);
        drop(inner);
        self.ready.notify_one();
    }

    /// Non-blocking pop; `None` when the queue is currently empty.
    pub fn try_pop(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    /// Blocks until an item is available or the queue is stopped. Returns
    /// `None` only after `stop`, once the backlog is exhausted.
    pub fn wait_and_pop(&self) -> Option<T> {
        let mut inner = self.lock();
        loop {
            if let Some(value) = inner.items.pop_front() {
                return Some(value);
            }
            if !inner.active {
                return None;
            }
            inner = self
                .ready
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Poison the queue: no further pushes are accepted and all waiters are
    /// woken.
    pub fn stop(&self) {
        self.lock().active = false;
        self.ready.notify_all();
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Drop all queued items, returning how many were discarded.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let discarded = inner.items.len();
        inner.items.clear();
        discarded
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn fifo_order() {
        let queue = JobQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.try_pop(), Some(2));
        assert_eq!(queue.try_pop(), Some(3));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn wait_and_pop_receives_cross_thread_push() {
        let queue = Arc::new(JobQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.wait_and_pop())
        };
        std::thread::sleep(Duration::from_millis(20));
        queue.push(42);
        assert_eq!(consumer.join().unwrap(), Some(42));
    }

    #[test]
    fn stop_wakes_blocked_consumers() {
        let queue: Arc<JobQueue<i32>> = Arc::new(JobQueue::new());
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || queue.wait_and_pop())
            })
            .collect();
        std::thread::sleep(Duration::from_millis(20));
        queue.stop();
        for consumer in consumers {
            assert_eq!(consumer.join().unwrap(), None);
        }
    }

    #[test]
    fn stop_drains_backlog_before_returning_none() {
        let queue = JobQueue::new();
        queue.push("job");
        queue.stop();
        assert_eq!(queue.wait_and_pop(), Some("job"));
        assert_eq!(queue.wait_and_pop(), None);
        // Pushes after stop are ignored.
        queue.push("late");
        assert_eq!(queue.wait_and_pop(), None);
    }

    #[test]
    fn clear_reports_discarded_count() {
        let queue = JobQueue::new();
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }
}
