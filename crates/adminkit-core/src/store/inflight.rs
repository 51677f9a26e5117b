// ── In-flight fetch registry ──
//
// Process-wide dedup window: controllers that compute the same QueryKey
// while a request is pending share one gateway call. The reconciling
// write runs inside the shared future, so it happens exactly once no
// matter how many controllers join.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};

use crate::error::StateError;
use crate::params::QueryKey;
use crate::record::RecordId;

/// What a deduped list fetch resolves to: the page of ids and the total,
/// already reconciled into the store by whichever join spawned the work.
#[derive(Debug, Clone)]
pub(crate) struct FetchedList {
    pub ids: Vec<RecordId>,
    pub total: u64,
}

pub(crate) type FetchShared = Shared<BoxFuture<'static, Result<FetchedList, StateError>>>;

pub(crate) struct InflightRegistry {
    pending: DashMap<QueryKey, FetchShared>,
}

impl InflightRegistry {
    pub(crate) fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Join the pending fetch for `key`, or spawn `make` as the shared
    /// fetch if none is pending. Callers await the returned future and
    /// then call [`finish`](Self::finish).
    pub(crate) fn join_or_spawn<F, Fut>(&self, key: &QueryKey, make: F) -> FetchShared
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FetchedList, StateError>> + Send + 'static,
    {
        match self.pending.entry(key.clone()) {
            Entry::Occupied(entry) => {
                tracing::debug!(key = %key, "joining in-flight fetch");
                entry.get().clone()
            }
            Entry::Vacant(slot) => {
                let shared = make().boxed().shared();
                slot.insert(shared.clone());
                shared
            }
        }
    }

    /// Drop the registry entry for `key` once its fetch has settled.
    /// Safe to call from every joiner; only completed entries are removed.
    pub(crate) fn finish(&self, key: &QueryKey) {
        self.pending
            .remove_if(key, |_, shared| shared.peek().is_some());
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}
