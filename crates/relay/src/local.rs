use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use uuid::Uuid;

use warden_core::Verdict;

/// Process-local verdict store used while the shared service is unreachable.
///
/// Holds the same retention contract as the durable backends: ids ordered
/// newest first, oldest evicted past the cap.
#[derive(Debug)]
pub struct LocalStore {
    inner: Mutex<Inner>,
    max_retained: usize,
}

#[derive(Debug, Default)]
struct Inner {
    order: VecDeque<Uuid>,
    verdicts: HashMap<Uuid, Verdict>,
    total: u64,
}

impl LocalStore {
    pub fn new(max_retained: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_retained: max_retained.max(1),
        }
    }

    pub fn put(&self, verdict: &Verdict) {
        self.put_retaining(verdict, self.max_retained);
    }

    /// Insert with an explicit retention cap.
    pub fn put_retaining(&self, verdict: &Verdict, retain: usize) {
        let retain = retain.max(1);
        let mut inner = lock(&self.inner);
        if inner.verdicts.insert(verdict.id, verdict.clone()).is_none() {
            inner.order.push_front(verdict.id);
            inner.total += 1;
        }
        while inner.order.len() > retain {
            if let Some(evicted) = inner.order.pop_back() {
                inner.verdicts.remove(&evicted);
            }
        }
    }

    pub fn get(&self, id: Uuid) -> Option<Verdict> {
        lock(&self.inner).verdicts.get(&id).cloned()
    }

    pub fn list(&self, limit: usize, offset: usize) -> Vec<Verdict> {
        let inner = lock(&self.inner);
        inner
            .order
            .iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| inner.verdicts.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_count(&self) -> u64 {
        lock(&self.inner).total
    }
}

/// A poisoned lock still holds consistent data here; every mutation is a
/// handful of infallible collection calls.
fn lock(m: &Mutex<Inner>) -> std::sync::MutexGuard<'_, Inner> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::test_support::verdict;

    #[test]
    fn evicts_oldest_past_cap() {
        let store = LocalStore::new(3);
        let verdicts: Vec<_> = (0..5).map(|i| verdict(&format!("tenant-{i}"))).collect();
        for v in &verdicts {
            store.put(v);
        }

        assert_eq!(store.len(), 3);
        assert_eq!(store.total_count(), 5);
        let listed: Vec<_> = store.list(10, 0).into_iter().map(|v| v.id).collect();
        assert_eq!(listed, vec![verdicts[4].id, verdicts[3].id, verdicts[2].id]);
        assert!(store.get(verdicts[0].id).is_none());
    }

    #[test]
    fn put_is_idempotent_per_id() {
        let store = LocalStore::new(10);
        let v = verdict("Acme Corp");
        store.put(&v);
        store.put(&v);
        assert_eq!(store.len(), 1);
        assert_eq!(store.total_count(), 1);
        assert_eq!(store.get(v.id), Some(v));
    }

    #[test]
    fn list_pages_with_offset() {
        let store = LocalStore::new(10);
        let verdicts: Vec<_> = (0..4).map(|i| verdict(&format!("t{i}"))).collect();
        for v in &verdicts {
            store.put(v);
        }
        let page: Vec<_> = store.list(2, 1).into_iter().map(|v| v.id).collect();
        assert_eq!(page, vec![verdicts[2].id, verdicts[1].id]);
        assert!(store.list(5, 10).is_empty());
    }
}
