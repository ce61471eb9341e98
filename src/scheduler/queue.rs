use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::scheduler::heap::{HeapEntry, JobHeap};
use crate::scheduler::job::JobId;

/// Blocking facade over the job heap.
///
/// One mutex guards every heap operation; a condvar pairs with it so
/// consumers can sleep while the queue is empty. Each insert signals exactly
/// one waiter, which is all an insert can satisfy, and every wait re-checks
/// the heap under the lock, so spurious wakeups and notify races cannot lose
/// work or hand the same entry to two consumers.
#[derive(Debug, Default)]
pub struct JobQueue {
    heap: Mutex<JobHeap>,
    not_empty: Condvar,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an entry and wake one waiting consumer.
    pub fn insert(&self, entry: HeapEntry) {
        let mut heap = self.heap.lock();
        heap.insert(entry);
        self.not_empty.notify_one();
    }

    /// Take the highest-priority entry, blocking indefinitely while the
    /// queue is empty.
    pub fn take(&self) -> HeapEntry {
        let mut heap = self.heap.lock();
        loop {
            if let Some(entry) = heap.pop() {
                return entry;
            }
            self.not_empty.wait(&mut heap);
        }
    }

    /// Take the highest-priority entry, waiting at most `timeout`.
    ///
    /// The deadline is fixed up front, so wakeups that find the queue still
    /// empty go back to sleep for the remainder of the budget instead of
    /// restarting it. One last pop after the deadline catches an insert that
    /// raced the timeout.
    pub fn poll(&self, timeout: Duration) -> Option<HeapEntry> {
        let deadline = Instant::now() + timeout;
        let mut heap = self.heap.lock();
        loop {
            if let Some(entry) = heap.pop() {
                return Some(entry);
            }
            if self.not_empty.wait_until(&mut heap, deadline).timed_out() {
                return heap.pop();
            }
        }
    }

    /// Non-blocking take. Used by draining workers.
    pub fn try_take(&self) -> Option<HeapEntry> {
        self.heap.lock().pop()
    }

    /// Excise a queued entry. Returns false when the id is not in the queue,
    /// which includes ids already claimed by a worker.
    pub fn remove(&self, id: JobId) -> bool {
        self.heap.lock().remove(id).is_some()
    }

    /// Re-rank a queued entry under a new base priority. Returns false when
    /// the id is not in the queue.
    pub fn reprioritize(&self, id: JobId, new_base: i64) -> bool {
        self.heap.lock().reprioritize(id, new_base)
    }

    /// Recompute every entry's effective priority as base plus waiting
    /// credit and restore heap order in one pass. Reordering does not change
    /// how many entries are queued, so no waiter needs waking.
    pub fn age(&self, rate_per_sec: i64) {
        let now = Instant::now();
        let mut heap = self.heap.lock();
        heap.rebuild(|entry| {
            let waited_ms = now.duration_since(entry.enqueued).as_millis() as i64;
            let credit = rate_per_sec.saturating_mul(waited_ms) / 1000;
            entry.base.saturating_add(credit)
        });
        tracing::trace!(queued = heap.len(), "Recomputed effective priorities");
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.heap.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }
}
