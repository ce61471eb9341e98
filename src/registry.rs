use std::sync::Arc;

use dashmap::DashMap;

use crate::scheduler::job::{JobId, JobRecord};

/// Shared id-to-record map.
///
/// Backed by a sharded concurrent map, so lookups and inserts on distinct
/// ids proceed in parallel rather than serializing on one lock. Records stay
/// registered after they reach a terminal status; the host decides when to
/// evict them.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<JobId, Arc<JobRecord>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, record: Arc<JobRecord>) {
        self.jobs.insert(record.id, record);
    }

    pub fn find(&self, id: JobId) -> Option<Arc<JobRecord>> {
        self.jobs.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, id: JobId) -> Option<Arc<JobRecord>> {
        self.jobs.remove(&id).map(|(_, record)| record)
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.jobs.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64) -> Arc<JobRecord> {
        Arc::new(JobRecord::new(JobId(id), 0, Box::new(|| Ok(()))))
    }

    #[test]
    fn register_and_find() {
        let registry = JobRegistry::new();
        registry.register(record(1));
        registry.register(record(2));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(JobId(1)));
        assert_eq!(registry.find(JobId(2)).map(|r| r.id), Some(JobId(2)));
        assert!(registry.find(JobId(3)).is_none());
    }

    #[test]
    fn remove_returns_record() {
        let registry = JobRegistry::new();
        registry.register(record(7));

        let removed = registry.remove(JobId(7)).expect("record should be present");
        assert_eq!(removed.id, JobId(7));
        assert!(registry.is_empty());
        assert!(registry.remove(JobId(7)).is_none());
    }

    #[test]
    fn concurrent_registration_of_distinct_ids() {
        let registry = Arc::new(JobRegistry::new());
        let mut handles = Vec::new();
        for t in 0..4u64 {
            let registry = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    registry.register(record(t * 1000 + i));
                }
            }));
        }
        for handle in handles {
            handle.join().expect("registration thread panicked");
        }
        assert_eq!(registry.len(), 400);
    }
}
