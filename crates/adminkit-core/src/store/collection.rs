// ── Per-resource record collection ──
//
// Lock-free concurrent storage for one resource: records by id plus
// query results by canonical key, with push-based change notification
// via a version counter on a `watch` channel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;

use crate::params::QueryKey;
use crate::record::{Record, RecordId};

// ── Query results ───────────────────────────────────────────────────

/// Whether a cached query result may be served without a refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Fresh,
    Stale,
}

/// The cached outcome of one list query: the ordered page of ids, the
/// total across all pages, and freshness metadata. Written only on
/// successful fetches.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub ids: Vec<RecordId>,
    pub total: u64,
    pub fetched_at: DateTime<Utc>,
    pub validity: Validity,
}

impl QueryResult {
    pub fn fresh(ids: Vec<RecordId>, total: u64) -> Self {
        Self {
            ids,
            total,
            fetched_at: Utc::now(),
            validity: Validity::Fresh,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.validity == Validity::Fresh
    }
}

// ── Collection ──────────────────────────────────────────────────────

/// Storage for a single resource.
///
/// Record writes are whole-record last-write-wins; a later write fully
/// replaces the record rather than merging field-by-field. Every
/// mutation bumps a version counter broadcast to subscribers.
pub(crate) struct ResourceCollection {
    records: DashMap<RecordId, Arc<Record>>,
    queries: DashMap<QueryKey, QueryResult>,
    version: watch::Sender<u64>,
}

impl ResourceCollection {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        Self {
            records: DashMap::new(),
            queries: DashMap::new(),
            version,
        }
    }

    // ── Records ──────────────────────────────────────────────────────

    pub(crate) fn get(&self, id: &RecordId) -> Option<Arc<Record>> {
        self.records.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up several ids, positions aligned with the input; unknown
    /// ids yield `None` at their slot.
    pub(crate) fn get_many(&self, ids: &[RecordId]) -> Vec<Option<Arc<Record>>> {
        ids.iter().map(|id| self.get(id)).collect()
    }

    /// Insert or replace records, returning the stored ids in input
    /// order. Records with no usable `id` field are dropped.
    pub(crate) fn put_records(&self, records: Vec<Record>) -> Vec<RecordId> {
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let Some(id) = record.id() else {
                tracing::warn!("discarding record without id field");
                continue;
            };
            self.records.insert(id.clone(), Arc::new(record));
            ids.push(id);
        }
        if !ids.is_empty() {
            self.bump_version();
        }
        ids
    }

    /// Remove a record by id. Returns the removed record if it existed.
    pub(crate) fn remove(&self, id: &RecordId) -> Option<Arc<Record>> {
        let removed = self.records.remove(id).map(|(_, record)| record);
        if removed.is_some() {
            self.bump_version();
        }
        removed
    }

    // ── Query results ────────────────────────────────────────────────

    pub(crate) fn query(&self, key: &QueryKey) -> Option<QueryResult> {
        self.queries.get(key).map(|entry| entry.value().clone())
    }

    pub(crate) fn put_query(&self, key: QueryKey, result: QueryResult) {
        self.queries.insert(key, result);
        self.bump_version();
    }

    /// Mark one cached query stale, forcing the next evaluation to hit
    /// the gateway. No-op for unknown keys.
    pub(crate) fn invalidate_query(&self, key: &QueryKey) {
        if let Some(mut entry) = self.queries.get_mut(key) {
            entry.validity = Validity::Stale;
        }
    }

    /// Mark every cached query stale. Records are untouched.
    pub(crate) fn invalidate(&self) {
        for mut entry in self.queries.iter_mut() {
            entry.validity = Validity::Stale;
        }
        self.bump_version();
    }

    // ── Introspection ────────────────────────────────────────────────

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    #[allow(dead_code)]
    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}
