// ── Data provider gateway ──
//
// The abstract capability every backend implements. Controllers speak
// only this trait; transport details (HTTP, in-memory fixtures, ...)
// live in provider crates. Any rejection carries an optional status and
// message and is treated uniformly as a fetch failure by the core.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::params::{Filter, Sort};
use crate::record::{Record, RecordId};

/// Pagination window of one list request, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
}

impl Pagination {
    /// Zero-based offset of the first requested record.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1) * self.per_page
    }
}

/// Parameters of a `get_list` request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub pagination: Pagination,
    pub sort: Option<Sort>,
    pub filter: Filter,
}

/// One page of records plus the total count across all pages.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub records: Vec<Record>,
    pub total: u64,
}

/// The data provider contract.
///
/// Implementations are shared behind `Arc<dyn DataProvider>` and must be
/// safe to call concurrently. Read operations must not mutate backend
/// state; write operations return the affected record as the backend
/// now sees it.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetch one page of a resource under pagination, sort, and filter.
    async fn get_list(&self, resource: &str, query: &ListQuery) -> Result<ListPage, ProviderError>;

    /// Fetch a single record by id.
    async fn get_one(&self, resource: &str, id: &RecordId) -> Result<Record, ProviderError>;

    /// Fetch several records by id.
    ///
    /// Ids with no matching record are silently absent from the result;
    /// callers align positions themselves. Order is not guaranteed.
    async fn get_many(
        &self,
        resource: &str,
        ids: &[RecordId],
    ) -> Result<Vec<Record>, ProviderError>;

    /// Create a record. The returned record carries the assigned id.
    async fn create(&self, resource: &str, data: Record) -> Result<Record, ProviderError>;

    /// Replace a record's fields.
    async fn update(
        &self,
        resource: &str,
        id: &RecordId,
        data: Record,
    ) -> Result<Record, ProviderError>;

    /// Delete a record, returning its last known state.
    async fn delete(&self, resource: &str, id: &RecordId) -> Result<Record, ProviderError>;
}
