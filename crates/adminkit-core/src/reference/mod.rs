// ── Reference resolution ──
//
// Resolves foreign-key fields (one id or an array of ids) against the
// shared store, fetching missing records through the batched `get_many`
// path. Results are positional: an id that cannot be resolved yields
// `None` at its slot, never a failed resolution for its neighbours.

mod batch;

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::accessor::FieldAccessor;
use crate::error::StateError;
use crate::record::{Record, RecordId};
use crate::store::Store;

pub use batch::ManyBatcher;

// ── Binding normalization ───────────────────────────────────────────

/// Read a source field and normalize it to an ordered id sequence.
///
/// A scalar id wraps into a single-element sequence; `null` or a
/// missing field is empty; array entries that are not identifiers are
/// skipped. Pure and allocation-cheap -- recomputed per resolution.
pub fn normalize_reference_ids(record: &Record, source: &str) -> Vec<RecordId> {
    match record.get_path(source) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(RecordId::from_value).collect(),
        Some(scalar) => RecordId::from_value(scalar).into_iter().collect(),
    }
}

// ── Derived state ───────────────────────────────────────────────────

/// What a reference field renders from.
#[derive(Debug, Clone)]
pub struct ReferenceState {
    /// Normalized ids, in source-field order.
    pub ids: Vec<RecordId>,
    /// Resolved records, position-aligned with `ids`; `None` marks an
    /// id the store could not resolve (e.g. a deleted foreign record).
    pub data: Vec<Option<Arc<Record>>>,
    /// True while any id is still unresolved and no fetch has settled.
    pub loading: bool,
    /// Set when the batched fetch itself failed; positional gaps alone
    /// are not an error.
    pub error: Option<StateError>,
}

impl ReferenceState {
    fn empty() -> Self {
        Self {
            ids: Vec::new(),
            data: Vec::new(),
            loading: false,
            error: None,
        }
    }

    /// The single referenced record, for scalar source fields.
    pub fn reference_record(&self) -> Option<&Arc<Record>> {
        match self.ids.len() {
            1 => self.data.first().and_then(Option::as_ref),
            _ => None,
        }
    }

    /// Build select options from the resolved records.
    pub fn options(&self, accessor: &FieldAccessor) -> Vec<SelectOption> {
        self.ids
            .iter()
            .zip(&self.data)
            .filter_map(|(id, record)| {
                let record = record.as_ref()?;
                let label = accessor.resolve_text(record)?;
                Some(SelectOption {
                    value: id.clone(),
                    label,
                })
            })
            .collect()
    }
}

/// One choice of a select widget: the referenced id plus display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: RecordId,
    pub label: String,
}

// ── Resolver ────────────────────────────────────────────────────────

/// Resolves reference bindings against one target resource.
///
/// Several resolvers (one per field/column) share a [`ManyBatcher`], so
/// simultaneous resolutions against the same target coalesce into a
/// single `get_many`.
pub struct ReferenceResolver {
    target: String,
    store: Arc<Store>,
    batcher: Arc<ManyBatcher>,
}

impl ReferenceResolver {
    pub fn new(store: Arc<Store>, batcher: Arc<ManyBatcher>, target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            store,
            batcher,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Store-only view of a binding: no fetch, `loading` flags whether
    /// anything is still missing. Cheap enough to call every render.
    pub fn current(&self, record: &Record, source: &str) -> ReferenceState {
        let ids = normalize_reference_ids(record, source);
        if ids.is_empty() {
            return ReferenceState::empty();
        }
        let data = self.store.get_many(&self.target, &ids);
        let loading = data.iter().any(Option::is_none);
        ReferenceState {
            ids,
            data,
            loading,
            error: None,
        }
    }

    /// Resolve a binding, fetching ids missing from the store through
    /// the shared batcher.
    pub async fn resolve(&self, record: &Record, source: &str) -> ReferenceState {
        let ids = normalize_reference_ids(record, source);
        if ids.is_empty() {
            return ReferenceState::empty();
        }

        let missing: Vec<RecordId> = {
            let present = self.store.get_many(&self.target, &ids);
            ids.iter()
                .zip(&present)
                .filter(|(_, record)| record.is_none())
                .map(|(id, _)| id.clone())
                .collect()
        };

        let error = if missing.is_empty() {
            None
        } else {
            debug!(target = %self.target, missing = missing.len(), "resolving missing references");
            self.batcher.load(&self.target, &missing).await.err()
        };

        let data = self.store.get_many(&self.target, &ids);
        ReferenceState {
            ids,
            data,
            loading: false,
            error,
        }
    }
}
