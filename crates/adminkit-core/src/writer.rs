// ── Mutation write-through ──
//
// Create/update/delete against the gateway, reconciled straight into
// the shared store. Every mutation invalidates the resource's cached
// queries so live lists refetch on their next evaluation or refresh.

use std::sync::Arc;

use tracing::debug;

use crate::error::CoreError;
use crate::provider::DataProvider;
use crate::record::{Record, RecordId};
use crate::store::Store;

/// Write surface for one (store, provider) pair.
pub struct DataWriter {
    store: Arc<Store>,
    provider: Arc<dyn DataProvider>,
}

impl DataWriter {
    pub fn new(store: Arc<Store>, provider: Arc<dyn DataProvider>) -> Self {
        Self { store, provider }
    }

    /// Create a record. The backend assigns the id; the created record
    /// is reconciled into the store and returned.
    pub async fn create(&self, resource: &str, data: Record) -> Result<Arc<Record>, CoreError> {
        let created = self.provider.create(resource, data).await?;
        let id = created.id().ok_or_else(|| {
            CoreError::Internal(format!("{resource} create response carries no id"))
        })?;
        self.store.put_records(resource, vec![created]);
        self.store.invalidate_resource(resource);
        debug!(resource, id = %id, "record created");
        self.store
            .record(resource, &id)
            .ok_or_else(|| CoreError::Internal("created record vanished from store".into()))
    }

    /// Replace a record's fields.
    pub async fn update(
        &self,
        resource: &str,
        id: &RecordId,
        data: Record,
    ) -> Result<Arc<Record>, CoreError> {
        let updated = self.provider.update(resource, id, data).await?;
        self.store.put_records(resource, vec![updated]);
        self.store.invalidate_resource(resource);
        debug!(resource, id = %id, "record updated");
        self.store
            .record(resource, id)
            .ok_or_else(|| CoreError::Internal("updated record vanished from store".into()))
    }

    /// Delete a record. The store entry is removed (a confirmed
    /// server-side deletion, not cache eviction) and cached queries are
    /// invalidated. Returns the record's last known state, if any.
    pub async fn delete(
        &self,
        resource: &str,
        id: &RecordId,
    ) -> Result<Option<Arc<Record>>, CoreError> {
        self.provider.delete(resource, id).await?;
        let removed = self.store.remove_record(resource, id);
        self.store.invalidate_resource(resource);
        debug!(resource, id = %id, "record deleted");
        Ok(removed)
    }
}
