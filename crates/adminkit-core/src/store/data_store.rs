// ── Shared record store ──
//
// The single source of truth for fetched data: per-resource collections
// of records plus cached query results, created lazily on first touch.
// Explicitly constructed and passed by reference (`Arc<Store>`) -- there
// is no ambient singleton; tests build and drop their own stores.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;

use super::collection::ResourceCollection;
use super::inflight::InflightRegistry;
use crate::params::QueryKey;
use crate::record::{Record, RecordId};

pub use super::collection::{QueryResult, Validity};

/// Process-wide record cache and query metadata.
///
/// Thread-safe and lock-free: reads are wait-free, writes use the
/// fine-grained shard locks inside `DashMap`. Record writes are
/// last-write-wins at whole-record granularity. Nothing is evicted by
/// default; callers invalidate by resource after mutations, which marks
/// cached queries stale without touching records.
pub struct Store {
    resources: DashMap<String, Arc<ResourceCollection>>,
    /// Dedup window for identical concurrent list fetches. Lives on the
    /// shared container so every controller sees the same window.
    pub(crate) inflight: InflightRegistry,
    last_reconciled: watch::Sender<Option<DateTime<Utc>>>,
}

impl Store {
    pub fn new() -> Self {
        let (last_reconciled, _) = watch::channel(None);
        Self {
            resources: DashMap::new(),
            inflight: InflightRegistry::new(),
            last_reconciled,
        }
    }

    fn collection(&self, resource: &str) -> Arc<ResourceCollection> {
        if let Some(existing) = self.resources.get(resource) {
            return Arc::clone(existing.value());
        }
        Arc::clone(
            self.resources
                .entry(resource.to_owned())
                .or_insert_with(|| Arc::new(ResourceCollection::new()))
                .value(),
        )
    }

    // ── Record access ────────────────────────────────────────────────

    pub fn record(&self, resource: &str, id: &RecordId) -> Option<Arc<Record>> {
        self.collection(resource).get(id)
    }

    /// Look up several ids, positions aligned with the input; unknown
    /// ids yield `None` at their slot.
    pub fn get_many(&self, resource: &str, ids: &[RecordId]) -> Vec<Option<Arc<Record>>> {
        self.collection(resource).get_many(ids)
    }

    /// Reconcile fetched records, returning the stored ids in input
    /// order. A later write fully replaces a record.
    pub fn put_records(&self, resource: &str, records: Vec<Record>) -> Vec<RecordId> {
        let ids = self.collection(resource).put_records(records);
        if !ids.is_empty() {
            self.last_reconciled.send_replace(Some(Utc::now()));
        }
        ids
    }

    pub fn remove_record(&self, resource: &str, id: &RecordId) -> Option<Arc<Record>> {
        self.collection(resource).remove(id)
    }

    pub fn resource_len(&self, resource: &str) -> usize {
        self.collection(resource).len()
    }

    // ── Query results ────────────────────────────────────────────────

    pub fn query_result(&self, resource: &str, key: &QueryKey) -> Option<QueryResult> {
        self.collection(resource).query(key)
    }

    pub fn put_query_result(&self, resource: &str, key: QueryKey, result: QueryResult) {
        self.collection(resource).put_query(key, result);
    }

    /// Mark one cached query stale (explicit refresh path).
    pub fn invalidate_query(&self, resource: &str, key: &QueryKey) {
        self.collection(resource).invalidate_query(key);
    }

    /// Mark every cached query of a resource stale. Used after create/
    /// update/delete mutations; records are untouched.
    pub fn invalidate_resource(&self, resource: &str) {
        tracing::debug!(resource, "invalidating cached queries");
        self.collection(resource).invalidate();
    }

    // ── Subscriptions & metadata ─────────────────────────────────────

    /// Subscribe to a resource's version counter; it bumps on every
    /// record or query mutation.
    pub fn subscribe_resource(&self, resource: &str) -> watch::Receiver<u64> {
        self.collection(resource).subscribe()
    }

    pub fn last_reconciled(&self) -> Option<DateTime<Utc>> {
        *self.last_reconciled.borrow()
    }

    /// How long ago data last arrived, or `None` if nothing was ever
    /// reconciled.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_reconciled().map(|t| Utc::now() - t)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
