// Shared test support: a scripted data provider with call counters,
// per-page response gates, and scripted failures.
// Not every test crate uses every helper.
#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Notify;

use adminkit_core::{DataProvider, ListPage, ListQuery, ProviderError, Record, RecordId};

pub struct StubProvider {
    dataset: Mutex<Vec<Value>>,
    pub list_calls: AtomicUsize,
    pub many_calls: AtomicUsize,
    pub last_list_query: Mutex<Option<ListQuery>>,
    gates: Mutex<HashMap<u64, Arc<Notify>>>,
    failing: AtomicBool,
    unresolvable: Mutex<HashSet<String>>,
}

impl StubProvider {
    pub fn with_dataset(dataset: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            dataset: Mutex::new(dataset),
            list_calls: AtomicUsize::new(0),
            many_calls: AtomicUsize::new(0),
            last_list_query: Mutex::new(None),
            gates: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            unresolvable: Mutex::new(HashSet::new()),
        })
    }

    /// `count` numbered book records: `{"id": i, "title": "book i"}`.
    pub fn books(count: i64) -> Arc<Self> {
        Self::with_dataset(
            (1..=count)
                .map(|i| json!({"id": i, "title": format!("book {i}")}))
                .collect(),
        )
    }

    /// Hold every `get_list` response for `page` until the returned
    /// gate is notified.
    pub fn gate_page(&self, page: u64) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(page, Arc::clone(&gate));
        gate
    }

    /// Make every subsequent fetch reject.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make `get_many` unable to resolve one id (as if the foreign
    /// record had been deleted).
    pub fn mark_unresolvable(&self, id: &RecordId) {
        self.unresolvable.lock().unwrap().insert(id.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn many_calls(&self) -> usize {
        self.many_calls.load(Ordering::SeqCst)
    }

    fn find(&self, id: &RecordId) -> Option<Record> {
        self.dataset
            .lock()
            .unwrap()
            .iter()
            .filter_map(|value| Record::from_value(value.clone()))
            .find(|record| record.id().as_ref() == Some(id))
    }
}

#[async_trait]
impl DataProvider for StubProvider {
    async fn get_list(&self, _resource: &str, query: &ListQuery) -> Result<ListPage, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_list_query.lock().unwrap() = Some(query.clone());

        let gate = self
            .gates
            .lock()
            .unwrap()
            .get(&query.pagination.page)
            .cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Http {
                message: "scripted failure".into(),
                code: None,
                status: 500,
            });
        }

        let dataset = self.dataset.lock().unwrap();
        let offset = usize::try_from(query.pagination.offset()).unwrap();
        let per_page = usize::try_from(query.pagination.per_page).unwrap();
        let records = dataset
            .iter()
            .skip(offset)
            .take(per_page)
            .cloned()
            .filter_map(Record::from_value)
            .collect();
        Ok(ListPage {
            records,
            total: u64::try_from(dataset.len()).unwrap(),
        })
    }

    async fn get_one(&self, resource: &str, id: &RecordId) -> Result<Record, ProviderError> {
        self.find(id).ok_or_else(|| ProviderError::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        })
    }

    async fn get_many(
        &self,
        _resource: &str,
        ids: &[RecordId],
    ) -> Result<Vec<Record>, ProviderError> {
        self.many_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Http {
                message: "scripted failure".into(),
                code: None,
                status: 500,
            });
        }
        let blocked = self.unresolvable.lock().unwrap().clone();
        Ok(ids
            .iter()
            .filter(|id| !blocked.contains(&id.to_string()))
            .filter_map(|id| self.find(id))
            .collect())
    }

    async fn create(&self, _resource: &str, data: Record) -> Result<Record, ProviderError> {
        let mut dataset = self.dataset.lock().unwrap();
        let next = dataset
            .iter()
            .filter_map(|value| value.get("id").and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1;
        let mut fields = data.into_fields();
        fields.insert("id".into(), json!(next));
        let value = Value::Object(fields);
        dataset.push(value.clone());
        Ok(Record::from_value(value).unwrap())
    }

    async fn update(
        &self,
        resource: &str,
        id: &RecordId,
        data: Record,
    ) -> Result<Record, ProviderError> {
        let mut dataset = self.dataset.lock().unwrap();
        let slot = dataset
            .iter_mut()
            .find(|value| {
                value
                    .get("id")
                    .and_then(RecordId::from_value)
                    .as_ref()
                    == Some(id)
            })
            .ok_or_else(|| ProviderError::NotFound {
                resource: resource.into(),
                id: id.to_string(),
            })?;
        let mut fields = data.into_fields();
        fields.insert("id".into(), id.to_value());
        *slot = Value::Object(fields);
        Ok(Record::from_value(slot.clone()).unwrap())
    }

    async fn delete(&self, resource: &str, id: &RecordId) -> Result<Record, ProviderError> {
        let mut dataset = self.dataset.lock().unwrap();
        let position = dataset
            .iter()
            .position(|value| {
                value
                    .get("id")
                    .and_then(RecordId::from_value)
                    .as_ref()
                    == Some(id)
            })
            .ok_or_else(|| ProviderError::NotFound {
                resource: resource.into(),
                id: id.to_string(),
            })?;
        let removed = dataset.remove(position);
        Ok(Record::from_value(removed).unwrap())
    }
}
