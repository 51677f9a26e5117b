// ── Preference persistence ──
//
// Injected capability for remembering per-resource list settings
// (sort, page size) across navigation. The core never touches disk;
// adminkit-config ships a file-backed implementation.

use dashmap::DashMap;
use serde_json::Value;

use crate::params::StoredParams;

/// Key-value persistence for user preferences.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
}

/// In-memory preference store. Default for tests and for applications
/// that don't persist UI state.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    entries: DashMap<String, Value>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: Value) {
        self.entries.insert(key.to_owned(), value);
    }
}

// ── List parameter persistence ──────────────────────────────────────

/// Preference key under which a resource's list parameters live.
pub fn list_params_key(resource: &str) -> String {
    format!("{resource}.list_params")
}

/// Read remembered list parameters, tolerating missing or malformed
/// entries (they fall back to defaults).
pub fn load_stored_params(prefs: &dyn PreferenceStore, resource: &str) -> StoredParams {
    prefs
        .get(&list_params_key(resource))
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}

/// Persist list parameters for a resource.
pub fn save_stored_params(prefs: &dyn PreferenceStore, resource: &str, stored: &StoredParams) {
    match serde_json::to_value(stored) {
        Ok(value) => prefs.set(&list_params_key(resource), value),
        Err(err) => tracing::warn!(resource, error = %err, "failed to serialize list preferences"),
    }
}
