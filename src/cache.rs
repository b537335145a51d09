use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::approval::ApprovalRequest;
use crate::models::family::EntityFamily;

/// Entry stored in the DashMap with an expiry timestamp.
#[derive(Clone)]
pub(crate) struct CacheEntry {
    requests: Arc<Vec<ApprovalRequest>>,
    pub(crate) expires_at: Instant,
}

/// In-memory copy of each family's review queue.
///
/// Entries are checked on read and evicted lazily. Every write path
/// (submission, final approval, batch processing) invalidates the family's
/// entry instead of patching it.
#[derive(Clone)]
pub struct ReviewQueueCache {
    pub(crate) local: Arc<DashMap<EntityFamily, CacheEntry>>,
    ttl: Duration,
}

impl ReviewQueueCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            local: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn get(&self, family: EntityFamily) -> Option<Arc<Vec<ApprovalRequest>>> {
        if let Some(entry) = self.local.get(&family) {
            if Instant::now() < entry.expires_at {
                return Some(entry.requests.clone());
            }
            // expired: drop the ref before removing
            drop(entry);
            self.local.remove(&family);
        }
        None
    }

    pub fn put(&self, family: EntityFamily, requests: Vec<ApprovalRequest>) -> Arc<Vec<ApprovalRequest>> {
        let requests = Arc::new(requests);
        if !self.ttl.is_zero() {
            self.local.insert(
                family,
                CacheEntry {
                    requests: requests.clone(),
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
        requests
    }

    pub fn invalidate(&self, family: EntityFamily) {
        self.local.remove(&family);
    }

    pub fn len(&self) -> usize {
        self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }
}
