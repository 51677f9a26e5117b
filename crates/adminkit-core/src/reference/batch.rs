// ── Reference fetch batching ──
//
// Coalesces `get_many` ids requested by any number of reference
// resolvers for the same target resource within one cooperative
// scheduler turn into a single gateway call. N rows referencing the
// same table cost one request, not N.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use indexmap::IndexSet;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{CoreError, StateError};
use crate::provider::DataProvider;
use crate::record::RecordId;
use crate::store::Store;

type BatchOutcome = Option<Result<(), StateError>>;

struct PendingBatch {
    ids: IndexSet<RecordId>,
    done: watch::Sender<BatchOutcome>,
}

/// Shared id-batching gateway for `get_many` lookups.
///
/// One batcher per (store, provider) pair; resolvers share it via `Arc`.
/// The first id enqueued for a resource opens a batch and schedules a
/// flush; the flush task yields once before draining, so every id
/// enqueued by already-runnable tasks lands in the same request.
pub struct ManyBatcher {
    store: Arc<Store>,
    provider: Arc<dyn DataProvider>,
    pending: DashMap<String, PendingBatch>,
}

impl ManyBatcher {
    pub fn new(store: Arc<Store>, provider: Arc<dyn DataProvider>) -> Self {
        Self {
            store,
            provider,
            pending: DashMap::new(),
        }
    }

    /// Enqueue `ids` for `resource` and wait until the batch containing
    /// them has been fetched and reconciled into the store.
    ///
    /// Ids with no backing record are not an error here; callers read
    /// the store afterwards and surface gaps positionally.
    pub async fn load(
        self: &Arc<Self>,
        resource: &str,
        ids: &[RecordId],
    ) -> Result<(), StateError> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut rx = match self.pending.entry(resource.to_owned()) {
            Entry::Occupied(mut entry) => {
                let batch = entry.get_mut();
                batch.ids.extend(ids.iter().cloned());
                batch.done.subscribe()
            }
            Entry::Vacant(slot) => {
                let (done, rx) = watch::channel(None);
                slot.insert(PendingBatch {
                    ids: ids.iter().cloned().collect(),
                    done,
                });
                let batcher = Arc::clone(self);
                let resource = resource.to_owned();
                tokio::spawn(async move {
                    batcher.flush(resource).await;
                });
                rx
            }
        };

        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                // Flush task dropped the sender without settling; treat
                // as an internal failure rather than hanging forever.
                return Err(Arc::new(CoreError::Internal(
                    "reference batch was abandoned".into(),
                )));
            }
        }
    }

    async fn flush(self: Arc<Self>, resource: String) {
        // The batching window: let every already-runnable enqueuer run
        // before the batch is sealed.
        tokio::task::yield_now().await;

        let Some((_, batch)) = self.pending.remove(&resource) else {
            return;
        };
        let ids: Vec<RecordId> = batch.ids.into_iter().collect();
        debug!(resource = %resource, count = ids.len(), "flushing reference batch");

        let outcome = match self.provider.get_many(&resource, &ids).await {
            Ok(records) => {
                self.store.put_records(&resource, records);
                Ok(())
            }
            Err(err) => {
                warn!(resource = %resource, error = %err, "reference batch fetch failed");
                Err(Arc::new(CoreError::Resolution {
                    resource: resource.clone(),
                    message: err.to_string(),
                }))
            }
        };
        let _ = batch.done.send(Some(outcome));
    }
}
