// ── Query parameter derivation ──
//
// Pure functions only: effective list parameters are derived from
// explicit inputs, persisted preferences, and defaults, and the result
// is canonicalized into a QueryKey used for caching and request dedup.
// No side effects here -- this module is the unit under property tests.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Sort ────────────────────────────────────────────────────────────

/// Sort direction. Displays as `ASC`/`DESC` (the wire convention).
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// A sort criterion: field name plus direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }
}

// ── Filter ──────────────────────────────────────────────────────────

/// A filter: field name to matched value, possibly nested.
///
/// Semantics are provider-defined (equality for plain fields, full-text
/// for `q` in the bundled providers); the core only merges and
/// canonicalizes filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(Map<String, Value>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from a JSON value. Non-objects yield an empty filter.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.0.iter()
    }

    /// Deep-merge `self` over `base`: every key of `base` is kept unless
    /// `self` also carries it, in which case `self` wins -- except when
    /// both sides hold objects, which merge recursively.
    pub fn merged_over(&self, base: &Filter) -> Filter {
        let mut merged = base.0.clone();
        merge_objects(&mut merged, &self.0);
        Filter(merged)
    }

    /// Canonical serialization: object keys sorted recursively, so two
    /// semantically identical filters always render identically.
    pub fn canonical_json(&self) -> String {
        canonicalize(&Value::Object(self.0.clone())).to_string()
    }
}

impl From<Map<String, Value>> for Filter {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn merge_objects(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match base.entry(key.clone()) {
            serde_json::map::Entry::Occupied(mut slot) => match (slot.get_mut(), value) {
                (Value::Object(existing), Value::Object(incoming)) => {
                    merge_objects(existing, incoming);
                }
                (slot_value, _) => *slot_value = value.clone(),
            },
            serde_json::map::Entry::Vacant(slot) => {
                slot.insert(value.clone());
            }
        }
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

// ── List parameters ─────────────────────────────────────────────────

/// The effective parameters of one list query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListParams {
    pub page: u64,
    pub per_page: u64,
    pub sort: Option<Sort>,
    pub filter: Filter,
}

/// Explicit inputs, highest precedence. All optional; unset fields fall
/// through to stored preferences and then defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamsInput {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub sort: Option<Sort>,
    pub filter: Filter,
}

/// Parameters remembered across sessions through a
/// [`PreferenceStore`](crate::preferences::PreferenceStore).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u64>,
}

/// Fallback values, lowest precedence. `base_filter` is the permanent
/// filter every derived query carries.
#[derive(Debug, Clone, PartialEq)]
pub struct ListDefaults {
    pub page: u64,
    pub per_page: u64,
    pub sort: Option<Sort>,
    pub base_filter: Filter,
}

impl Default for ListDefaults {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
            sort: None,
            base_filter: Filter::new(),
        }
    }
}

/// Derive the effective parameters.
///
/// Tie-breaks: explicit input > stored preference > default. Page and
/// per-page clamp to at least 1. The input filter deep-merges over the
/// permanent base filter, input winning on collision.
pub fn compute_params(
    input: &ParamsInput,
    stored: &StoredParams,
    defaults: &ListDefaults,
) -> ListParams {
    let page = input.page.unwrap_or(defaults.page).max(1);
    let per_page = input
        .per_page
        .or(stored.per_page)
        .unwrap_or(defaults.per_page)
        .max(1);
    let sort = input
        .sort
        .clone()
        .or_else(|| stored.sort.clone())
        .or_else(|| defaults.sort.clone());
    let filter = input.filter.merged_over(&defaults.base_filter);

    ListParams {
        page,
        per_page,
        sort,
        filter,
    }
}

// ── QueryKey ────────────────────────────────────────────────────────

/// Canonical cache and dedup key for one list query.
///
/// Two semantically identical queries produce an identical key
/// regardless of filter key insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the canonical key for `resource` under `params`.
pub fn query_key(resource: &str, params: &ListParams) -> QueryKey {
    let (sort_field, sort_order) = match &params.sort {
        Some(sort) => (sort.field.as_str(), sort.order.to_string()),
        None => ("", String::new()),
    };
    QueryKey(format!(
        "{resource}?filter={}&page={}&perPage={}&sort={sort_field}&order={sort_order}",
        params.filter.canonical_json(),
        params.page,
        params.per_page,
    ))
}
