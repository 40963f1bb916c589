//! Singleflight for deduplicating concurrent node resolutions.

use std::hash::Hash;

use dashmap::DashMap;
use tokio::sync::broadcast;
use treeacl_storage::TreeNode;

/// Outcome shared with followers. Errors are not shared: a follower that
/// sees `None` from a failed leader retries on its own.
pub(crate) type SharedResolution = Option<TreeNode>;

/// Result of trying to acquire a singleflight slot.
pub(crate) enum SingleflightSlot {
    /// We won the race and should execute the operation.
    Leader(broadcast::Sender<SharedResolution>),
    /// Another task is executing; wait for its result.
    Follower(broadcast::Receiver<SharedResolution>),
}

/// At most one in-flight resolution per key.
///
/// Uses DashMap's entry API for atomic check-and-insert, so two callers can
/// never both become leader for the same key.
pub(crate) struct Singleflight<K>
where
    K: Hash + Eq + Clone,
{
    in_flight: DashMap<K, broadcast::Sender<SharedResolution>>,
}

impl<K> Singleflight<K>
where
    K: Hash + Eq + Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
        }
    }

    /// Atomically try to acquire a slot for this operation.
    pub(crate) fn acquire(&self, key: K) -> SingleflightSlot {
        use dashmap::mapref::entry::Entry;

        match self.in_flight.entry(key) {
            Entry::Occupied(entry) => SingleflightSlot::Follower(entry.get().subscribe()),
            Entry::Vacant(entry) => {
                let (tx, _rx) = broadcast::channel(1);
                entry.insert(tx.clone());
                SingleflightSlot::Leader(tx)
            }
        }
    }

    /// Remove a completed in-flight request.
    pub(crate) fn complete(&self, key: &K) {
        self.in_flight.remove(key);
    }

    #[cfg(test)]
    pub(crate) fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

/// RAII guard that releases the slot even if the leader is cancelled or panics.
pub(crate) struct SingleflightGuard<'a, K>
where
    K: Hash + Eq + Clone,
{
    singleflight: &'a Singleflight<K>,
    key: K,
}

impl<'a, K> SingleflightGuard<'a, K>
where
    K: Hash + Eq + Clone,
{
    pub(crate) fn new(singleflight: &'a Singleflight<K>, key: K) -> Self {
        Self { singleflight, key }
    }
}

impl<K> Drop for SingleflightGuard<'_, K>
where
    K: Hash + Eq + Clone,
{
    fn drop(&mut self) {
        self.singleflight.complete(&self.key);
    }
}
