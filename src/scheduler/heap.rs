//! Indexed binary max-heap over queued jobs.
//!
//! A plain array-backed heap is enough for insert and extract, but this
//! scheduler also has to cancel and reprioritize jobs sitting in the middle
//! of the queue. [`JobHeap`] therefore pairs the entry array with an
//! id-to-position map, updated on every swap, so any entry can be located
//! in O(1) and removed or re-ranked in O(log n):
//! - **insert**: push at the end, sift up
//! - **pop**: swap the root with the last entry, sift the replacement down
//! - **remove**: swap the victim with the last entry, sift the replacement
//!   in whichever direction restores order
//! - **reprioritize**: rewrite the entry's priority in place, then sift
//! - **rebuild**: recompute every effective priority and re-heapify in one
//!   bottom-up pass (the aging path)
//!
//! Ordering is by effective priority, highest first; ties dispatch in
//! submission order. All access is expected to happen under the queue lock,
//! so the heap itself is single-threaded code.

use std::collections::HashMap;
use std::time::Instant;

use crate::scheduler::job::JobId;

/// One queued job as the heap ranks it.
#[derive(Debug, Clone, Copy)]
pub struct HeapEntry {
    pub id: JobId,
    /// Priority as last set by submit or reprioritize.
    pub base: i64,
    /// Priority the comparator actually uses. Equals `base` until an aging
    /// rebuild adds waiting credit on top.
    pub eff: i64,
    /// When the job entered the queue, for aging arithmetic.
    pub enqueued: Instant,
}

impl HeapEntry {
    pub fn new(id: JobId, base: i64, enqueued: Instant) -> Self {
        Self {
            id,
            base,
            eff: base,
            enqueued,
        }
    }

    /// The one comparator in the crate: higher effective priority wins, and
    /// between equals the earlier submission wins. Ids are assigned from a
    /// monotonic counter, so id order is submission order.
    pub fn ranks_above(&self, other: &HeapEntry) -> bool {
        self.eff > other.eff || (self.eff == other.eff && self.id < other.id)
    }
}

#[derive(Debug, Default)]
pub struct JobHeap {
    items: Vec<HeapEntry>,
    /// id -> index into `items`. Maintained by every swap, push and pop.
    positions: HashMap<JobId, usize>,
}

impl JobHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn peek(&self) -> Option<&HeapEntry> {
        self.items.first()
    }

    /// O(log n) insert. The id must not already be in the heap.
    pub fn insert(&mut self, entry: HeapEntry) {
        debug_assert!(
            !self.positions.contains_key(&entry.id),
            "job {} inserted twice",
            entry.id
        );
        let pos = self.items.len();
        self.positions.insert(entry.id, pos);
        self.items.push(entry);
        self.sift_up(pos);
    }

    /// Remove and return the highest-ranked entry, or `None` when empty.
    pub fn pop(&mut self) -> Option<HeapEntry> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        if last > 0 {
            self.swap_entries(0, last);
        }
        let top = self.items.pop()?;
        self.positions.remove(&top.id);
        if !self.items.is_empty() {
            self.sift_down(0);
        }
        Some(top)
    }

    /// Remove an arbitrary entry by id in O(log n).
    ///
    /// The last entry takes the victim's slot and is then sifted up first;
    /// if it did not move, sifted down. Both directions are required: the
    /// replacement comes from a different subtree and may rank either above
    /// the vacated position's parent or below its children.
    pub fn remove(&mut self, id: JobId) -> Option<HeapEntry> {
        let pos = self.position_of(id)?;
        let last = self.items.len() - 1;
        if pos == last {
            self.positions.remove(&id);
            return self.items.pop();
        }
        self.swap_entries(pos, last);
        let removed = self.items.pop();
        self.positions.remove(&id);
        if self.sift_up(pos) == pos {
            self.sift_down(pos);
        }
        removed
    }

    /// Change an entry's base priority in place and restore heap order.
    /// Any aging credit already accrued on top of the old base carries over.
    /// Returns false when the id is not queued.
    pub fn reprioritize(&mut self, id: JobId, new_base: i64) -> bool {
        let Some(pos) = self.position_of(id) else {
            return false;
        };
        let entry = &mut self.items[pos];
        entry.eff = entry.eff.saturating_sub(entry.base).saturating_add(new_base);
        entry.base = new_base;
        if self.sift_up(pos) == pos {
            self.sift_down(pos);
        }
        true
    }

    /// Recompute every entry's effective priority and re-heapify.
    ///
    /// One O(n) bottom-up pass instead of n individual sifts; the aging
    /// thread calls this on its rebuild interval. Priorities are never
    /// recomputed lazily inside the comparator, so between rebuilds the
    /// ordering stays frozen and every sift sees consistent keys.
    pub fn rebuild<F>(&mut self, mut eff_of: F)
    where
        F: FnMut(&HeapEntry) -> i64,
    {
        for entry in &mut self.items {
            entry.eff = eff_of(entry);
        }
        for pos in (0..self.items.len() / 2).rev() {
            self.sift_down(pos);
        }
    }

    /// Locate an entry by id, verifying the index against the entry itself.
    /// A mismatch means the index drifted from the array, which the swap
    /// discipline should make impossible; recover with a linear scan rather
    /// than trust a stale position.
    fn position_of(&self, id: JobId) -> Option<usize> {
        let &pos = self.positions.get(&id)?;
        if pos < self.items.len() && self.items[pos].id == id {
            return Some(pos);
        }
        debug_assert!(false, "position index out of sync for job {id}");
        self.items.iter().position(|entry| entry.id == id)
    }

    fn swap_entries(&mut self, a: usize, b: usize) {
        self.items.swap(a, b);
        self.positions.insert(self.items[a].id, a);
        self.positions.insert(self.items[b].id, b);
    }

    /// Move the entry at `pos` toward the root while it outranks its parent.
    /// Returns the final position.
    fn sift_up(&mut self, mut pos: usize) -> usize {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.items[pos].ranks_above(&self.items[parent]) {
                break;
            }
            self.swap_entries(pos, parent);
            pos = parent;
        }
        pos
    }

    /// Move the entry at `pos` toward the leaves while a child outranks it.
    /// Returns the final position.
    fn sift_down(&mut self, mut pos: usize) -> usize {
        loop {
            let left = 2 * pos + 1;
            if left >= self.items.len() {
                return pos;
            }
            let right = left + 1;
            let mut best = left;
            if right < self.items.len() && self.items[right].ranks_above(&self.items[left]) {
                best = right;
            }
            if !self.items[best].ranks_above(&self.items[pos]) {
                return pos;
            }
            self.swap_entries(pos, best);
            pos = best;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::Rng;

    fn entry(id: u64, priority: i64) -> HeapEntry {
        HeapEntry::new(JobId(id), priority, Instant::now())
    }

    /// Walks the full structure: every parent outranks (or ties with, in id
    /// order) its children, and the position map matches the array exactly.
    fn assert_heap_valid(heap: &JobHeap) {
        for pos in 1..heap.items.len() {
            let parent = (pos - 1) / 2;
            assert!(
                !heap.items[pos].ranks_above(&heap.items[parent]),
                "entry at {} outranks its parent at {}",
                pos,
                parent
            );
        }
        assert_eq!(heap.positions.len(), heap.items.len());
        for (pos, item) in heap.items.iter().enumerate() {
            assert_eq!(
                heap.positions.get(&item.id),
                Some(&pos),
                "stale position for job {}",
                item.id
            );
        }
    }

    fn drain_ids(heap: &mut JobHeap) -> Vec<u64> {
        let mut ids = Vec::new();
        while let Some(top) = heap.pop() {
            ids.push(top.id.0);
            assert_heap_valid(heap);
        }
        ids
    }

    #[test]
    fn test_pop_orders_by_priority_desc() {
        let mut heap = JobHeap::new();
        for (id, priority) in [(1, 3), (2, 10), (3, 7), (4, 1), (5, 8)] {
            heap.insert(entry(id, priority));
            assert_heap_valid(&heap);
        }
        assert_eq!(drain_ids(&mut heap), vec![2, 5, 3, 1, 4]);
    }

    #[test]
    fn test_equal_priority_dispatches_fifo() {
        let mut heap = JobHeap::new();
        for id in 1..=6 {
            heap.insert(entry(id, 5));
        }
        assert_eq!(drain_ids(&mut heap), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_pop_empty_returns_none() {
        let mut heap = JobHeap::new();
        assert!(heap.pop().is_none());
        assert!(heap.peek().is_none());
        assert_eq!(heap.len(), 0);
        assert!(heap.is_empty());
    }

    #[test]
    fn test_peek_does_not_remove() {
        let mut heap = JobHeap::new();
        heap.insert(entry(1, 4));
        heap.insert(entry(2, 9));
        assert_eq!(heap.peek().map(|e| e.id), Some(JobId(2)));
        assert_eq!(heap.len(), 2);
        assert_eq!(heap.peek().map(|e| e.id), Some(JobId(2)));
    }

    #[test]
    fn test_remove_root_and_leaf() {
        let mut heap = JobHeap::new();
        for (id, priority) in [(1, 9), (2, 5), (3, 7), (4, 2)] {
            heap.insert(entry(id, priority));
        }
        let root = heap.remove(JobId(1)).expect("root should be removable");
        assert_eq!(root.base, 9);
        assert_heap_valid(&heap);

        let leaf = heap.remove(JobId(4)).expect("leaf should be removable");
        assert_eq!(leaf.base, 2);
        assert_heap_valid(&heap);

        assert_eq!(drain_ids(&mut heap), vec![3, 2]);
    }

    /// Removal where the replacement entry must travel toward the root.
    /// The inserts below lay the array out as [10, 2, 9, 1, 1, 8, 8]; after
    /// removing the priority-1 entry at position 3, the priority-8 entry
    /// that replaces it outranks its priority-2 parent.
    #[test]
    fn test_remove_sifts_replacement_up() {
        let mut heap = JobHeap::new();
        for (id, priority) in [(1, 10), (2, 2), (3, 9), (4, 1), (5, 1), (6, 8), (7, 8)] {
            heap.insert(entry(id, priority));
        }
        assert!(heap.remove(JobId(4)).is_some());
        assert_heap_valid(&heap);
        assert_eq!(drain_ids(&mut heap), vec![1, 3, 6, 7, 2, 5]);
    }

    #[test]
    fn test_remove_unknown_returns_none() {
        let mut heap = JobHeap::new();
        heap.insert(entry(1, 1));
        assert!(heap.remove(JobId(99)).is_none());
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn test_remove_then_reinsert_same_id() {
        let mut heap = JobHeap::new();
        heap.insert(entry(1, 4));
        let removed = heap.remove(JobId(1)).expect("entry should be present");
        assert!(heap.is_empty());
        heap.insert(removed);
        assert_eq!(heap.pop().map(|e| e.id), Some(JobId(1)));
    }

    #[test]
    fn test_reprioritize_moves_entry_up() {
        let mut heap = JobHeap::new();
        for (id, priority) in [(1, 10), (2, 5), (3, 8)] {
            heap.insert(entry(id, priority));
        }
        assert!(heap.reprioritize(JobId(2), 20));
        assert_heap_valid(&heap);
        assert_eq!(drain_ids(&mut heap), vec![2, 1, 3]);
    }

    #[test]
    fn test_reprioritize_moves_entry_down() {
        let mut heap = JobHeap::new();
        for (id, priority) in [(1, 10), (2, 5), (3, 8)] {
            heap.insert(entry(id, priority));
        }
        assert!(heap.reprioritize(JobId(1), 1));
        assert_heap_valid(&heap);
        assert_eq!(drain_ids(&mut heap), vec![3, 2, 1]);
    }

    #[test]
    fn test_reprioritize_unknown_returns_false() {
        let mut heap = JobHeap::new();
        heap.insert(entry(1, 1));
        assert!(!heap.reprioritize(JobId(42), 100));
    }

    #[test]
    fn test_reprioritize_preserves_aging_credit() {
        let mut heap = JobHeap::new();
        heap.insert(entry(1, 10));
        // Simulate an aging rebuild granting 4 points of waiting credit.
        heap.rebuild(|e| e.base + 4);
        assert_eq!(heap.peek().map(|e| e.eff), Some(14));

        assert!(heap.reprioritize(JobId(1), 20));
        assert_eq!(heap.peek().map(|e| e.base), Some(20));
        assert_eq!(heap.peek().map(|e| e.eff), Some(24));
    }

    #[test]
    fn test_rebuild_reorders_under_new_keys() {
        let mut heap = JobHeap::new();
        for (id, priority) in [(1, 1), (2, 2), (3, 3), (4, 4)] {
            heap.insert(entry(id, priority));
        }
        // Invert the ranking: lowest base becomes highest effective.
        heap.rebuild(|e| -e.base);
        assert_heap_valid(&heap);
        assert_eq!(drain_ids(&mut heap), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_randomized_operations_keep_invariant() {
        let mut rng = rand::thread_rng();
        let mut heap = JobHeap::new();
        let mut live: Vec<u64> = Vec::new();
        let mut next_id = 0u64;

        for _ in 0..2000 {
            match rng.gen_range(0..4) {
                0 => {
                    next_id += 1;
                    heap.insert(entry(next_id, rng.gen_range(-50..50)));
                    live.push(next_id);
                }
                1 => {
                    if let Some(top) = heap.pop() {
                        live.retain(|&id| id != top.id.0);
                    }
                }
                2 => {
                    if !live.is_empty() {
                        let id = live[rng.gen_range(0..live.len())];
                        assert!(heap.remove(JobId(id)).is_some());
                        live.retain(|&l| l != id);
                    }
                }
                _ => {
                    if !live.is_empty() {
                        let id = live[rng.gen_range(0..live.len())];
                        assert!(heap.reprioritize(JobId(id), rng.gen_range(-50..50)));
                    }
                }
            }
            assert_heap_valid(&heap);
            assert_eq!(heap.len(), live.len());
        }
    }

    #[test]
    fn test_pop_sequence_is_sorted_after_random_inserts() {
        let mut rng = rand::thread_rng();
        let mut heap = JobHeap::new();
        for id in 0..500 {
            heap.insert(entry(id, rng.gen_range(-1000..1000)));
        }
        let mut last: Option<HeapEntry> = None;
        while let Some(top) = heap.pop() {
            if let Some(prev) = last {
                assert!(
                    !top.ranks_above(&prev),
                    "job {} popped after lower-ranked job {}",
                    top.id,
                    prev.id
                );
            }
            last = Some(top);
        }
    }
}
