// ── In-memory data provider ──
//
// A fully conforming gateway over seeded JSON fixtures. Used in tests,
// demos, and offline development. Filtering supports exact equality,
// `_gte`/`_lte` range suffixes, array membership, and a `q` full-text
// field scanned across string values.

use std::cmp::Ordering;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use adminkit_core::{
    DataProvider, Filter, ListPage, ListQuery, ProviderError, Record, RecordId, SortOrder,
};

/// Seedable in-memory provider.
///
/// Each resource is an ordered list of records; list queries filter,
/// sort, and slice a snapshot of it. Writes mutate the fixture data,
/// so created records show up in subsequent lists.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    resources: DashMap<String, Vec<Record>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style seeding from raw JSON values; non-objects are
    /// silently dropped.
    pub fn with_resource(self, resource: impl Into<String>, records: Vec<Value>) -> Self {
        self.seed(resource, records);
        self
    }

    /// Replace a resource's fixture data.
    pub fn seed(&self, resource: impl Into<String>, records: Vec<Value>) {
        let parsed = records.into_iter().filter_map(Record::from_value).collect();
        self.resources.insert(resource.into(), parsed);
    }

    pub fn len(&self, resource: &str) -> usize {
        self.resources
            .get(resource)
            .map_or(0, |records| records.len())
    }

    pub fn is_empty(&self, resource: &str) -> bool {
        self.len(resource) == 0
    }

    fn snapshot(&self, resource: &str) -> Vec<Record> {
        self.resources
            .get(resource)
            .map(|records| records.value().clone())
            .unwrap_or_default()
    }

    /// Pick an id for a created record: max-plus-one over integer ids,
    /// or a fresh UUID once any string id is in play.
    fn next_id(existing: &[Record]) -> RecordId {
        let mut max = 0i64;
        for record in existing {
            match record.id() {
                Some(RecordId::Int(n)) => max = max.max(n),
                Some(RecordId::Str(_)) => return RecordId::Str(Uuid::new_v4().to_string()),
                None => {}
            }
        }
        RecordId::Int(max + 1)
    }
}

#[async_trait]
impl DataProvider for MemoryProvider {
    async fn get_list(&self, resource: &str, query: &ListQuery) -> Result<ListPage, ProviderError> {
        let mut records: Vec<Record> = self
            .snapshot(resource)
            .into_iter()
            .filter(|record| matches_filter(record, &query.filter))
            .collect();

        if let Some(sort) = &query.sort {
            records.sort_by(|a, b| {
                let ordering = compare_values(a.get_path(&sort.field), b.get_path(&sort.field));
                match sort.order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }

        let total = u64::try_from(records.len()).unwrap_or(u64::MAX);
        let offset = usize::try_from(query.pagination.offset()).unwrap_or(usize::MAX);
        let per_page = usize::try_from(query.pagination.per_page).unwrap_or(usize::MAX);
        let records = records.into_iter().skip(offset).take(per_page).collect();

        Ok(ListPage { records, total })
    }

    async fn get_one(&self, resource: &str, id: &RecordId) -> Result<Record, ProviderError> {
        self.snapshot(resource)
            .into_iter()
            .find(|record| record.id().as_ref() == Some(id))
            .ok_or_else(|| ProviderError::NotFound {
                resource: resource.into(),
                id: id.to_string(),
            })
    }

    async fn get_many(
        &self,
        resource: &str,
        ids: &[RecordId],
    ) -> Result<Vec<Record>, ProviderError> {
        Ok(self
            .snapshot(resource)
            .into_iter()
            .filter(|record| record.id().is_some_and(|id| ids.contains(&id)))
            .collect())
    }

    async fn create(&self, resource: &str, data: Record) -> Result<Record, ProviderError> {
        let mut entry = self.resources.entry(resource.to_owned()).or_default();
        let mut record = data;
        let id = match record.id() {
            Some(id) => id,
            None => {
                let id = Self::next_id(entry.value());
                record.set(adminkit_core::ID_FIELD, id.to_value());
                id
            }
        };
        if entry.value().iter().any(|r| r.id().as_ref() == Some(&id)) {
            return Err(ProviderError::Invalid {
                message: format!("{resource} already contains id {id}"),
            });
        }
        entry.value_mut().push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        resource: &str,
        id: &RecordId,
        data: Record,
    ) -> Result<Record, ProviderError> {
        let mut entry =
            self.resources
                .get_mut(resource)
                .ok_or_else(|| ProviderError::NotFound {
                    resource: resource.into(),
                    id: id.to_string(),
                })?;
        let slot = entry
            .value_mut()
            .iter_mut()
            .find(|record| record.id().as_ref() == Some(id))
            .ok_or_else(|| ProviderError::NotFound {
                resource: resource.into(),
                id: id.to_string(),
            })?;
        let mut record = data;
        record.set(adminkit_core::ID_FIELD, id.to_value());
        *slot = record.clone();
        Ok(record)
    }

    async fn delete(&self, resource: &str, id: &RecordId) -> Result<Record, ProviderError> {
        let mut entry =
            self.resources
                .get_mut(resource)
                .ok_or_else(|| ProviderError::NotFound {
                    resource: resource.into(),
                    id: id.to_string(),
                })?;
        let position = entry
            .value()
            .iter()
            .position(|record| record.id().as_ref() == Some(id))
            .ok_or_else(|| ProviderError::NotFound {
                resource: resource.into(),
                id: id.to_string(),
            })?;
        Ok(entry.value_mut().remove(position))
    }
}

// ── Filtering ───────────────────────────────────────────────────────

fn matches_filter(record: &Record, filter: &Filter) -> bool {
    filter.iter().all(|(key, expected)| {
        if key == "q" {
            return expected
                .as_str()
                .is_none_or(|needle| full_text_match(record, needle));
        }
        if let Some(field) = key.strip_suffix("_gte") {
            return compare_values(record.get_path(field), Some(expected)) != Ordering::Less;
        }
        if let Some(field) = key.strip_suffix("_lte") {
            return compare_values(record.get_path(field), Some(expected)) != Ordering::Greater;
        }
        match (record.get_path(key), expected) {
            // Array filter value: membership test.
            (Some(actual), Value::Array(choices)) => choices.contains(actual),
            (Some(actual), expected) => actual == expected,
            (None, _) => false,
        }
    })
}

fn full_text_match(record: &Record, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    record.fields().values().any(|value| match value {
        Value::String(s) => s.to_lowercase().contains(&needle),
        _ => false,
    })
}

// ── Value ordering ──────────────────────────────────────────────────

/// Total order over JSON values for sorting: missing < null < bool <
/// number < string; arrays and objects compare by their JSON text.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let (ra, rb) = (type_rank(a), type_rank(b));
            if ra != rb {
                return ra.cmp(&rb);
            }
            match (a, b) {
                (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
                (Value::Number(a), Value::Number(b)) => {
                    let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
                }
                (Value::String(a), Value::String(b)) => a.cmp(b),
                _ => a.to_string().cmp(&b.to_string()),
            }
        }
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}
