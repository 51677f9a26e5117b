//! Shared configuration for adminkit applications.
//!
//! TOML settings (figment: defaults + file + env) and a file-backed
//! [`PreferenceStore`] implementation so list parameters survive
//! restarts. The core never touches disk -- applications construct
//! these and inject them.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use adminkit_core::{Filter, ListDefaults, PreferenceStore, Sort, SortOrder};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize preferences: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Top-level application settings.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Settings {
    /// Defaults applied to every list unless a resource overrides them.
    #[serde(default)]
    pub list: ListSettings,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ListSettings {
    #[serde(default = "default_per_page")]
    pub per_page: u64,

    /// Default sort field (none = backend order).
    pub sort_field: Option<String>,

    /// "ASC" or "DESC".
    #[serde(default = "default_sort_order")]
    pub sort_order: String,
}

impl Default for ListSettings {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
            sort_field: None,
            sort_order: default_sort_order(),
        }
    }
}

fn default_per_page() -> u64 {
    10
}
fn default_sort_order() -> String {
    "ASC".into()
}

impl ListSettings {
    /// Translate into the core's list defaults.
    pub fn list_defaults(&self) -> Result<ListDefaults, ConfigError> {
        let order: SortOrder =
            self.sort_order
                .parse()
                .map_err(|_| ConfigError::Validation {
                    field: "list.sort_order".into(),
                    reason: format!("expected 'ASC' or 'DESC', got '{}'", self.sort_order),
                })?;
        Ok(ListDefaults {
            page: 1,
            per_page: self.per_page.max(1),
            sort: self.sort_field.clone().map(|field| Sort { field, order }),
            base_filter: Filter::new(),
        })
    }
}

// ── Paths ───────────────────────────────────────────────────────────

/// Resolve the settings file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dir("config.toml", |dirs| dirs.config_dir().to_path_buf())
}

/// Resolve the preference file path (mutable UI state, kept apart from
/// hand-edited settings).
pub fn preferences_path() -> PathBuf {
    project_dir("preferences.toml", |dirs| dirs.data_dir().to_path_buf())
}

fn project_dir(file: &str, pick: impl Fn(&ProjectDirs) -> PathBuf) -> PathBuf {
    let base = ProjectDirs::from("rs", "adminkit", "adminkit").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("adminkit");
            p
        },
        |dirs| pick(&dirs),
    );
    base.join(file)
}

// ── Settings loading ────────────────────────────────────────────────

/// Load settings from the canonical path plus `ADMINKIT_`-prefixed
/// environment overrides (`ADMINKIT_LIST__PER_PAGE=25`).
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&config_path())
}

/// Same, from an explicit file (tests, alternate roots).
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ADMINKIT_").split("__"));

    let settings: Settings = figment.extract()?;
    Ok(settings)
}

pub fn load_settings_or_default() -> Settings {
    load_settings().unwrap_or_default()
}

// ── File-backed preferences ─────────────────────────────────────────

/// TOML-persisted [`PreferenceStore`].
///
/// The whole table is kept in memory and rewritten on every `set`;
/// preference traffic is a few writes per user interaction, not a hot
/// path. Missing or malformed files start empty rather than failing.
pub struct FilePreferences {
    path: PathBuf,
    entries: Mutex<toml::Table>,
}

impl FilePreferences {
    /// Open (or start) the preference file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::read_table(&path);
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// Open the platform-default preference file.
    pub fn at_default_path() -> Self {
        Self::new(preferences_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(path: &Path) -> toml::Table {
        match std::fs::read_to_string(path) {
            Ok(raw) => raw.parse().unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err,
                    "preference file is malformed; starting empty");
                toml::Table::new()
            }),
            Err(_) => toml::Table::new(),
        }
    }

    fn persist(&self, entries: &toml::Table) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(entries)?;
        std::fs::write(&self.path, rendered)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Option<Value> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .and_then(|value| serde_json::to_value(value).ok())
    }

    fn set(&self, key: &str, value: Value) {
        // TOML has no null; values that cannot be represented are dropped.
        let Ok(converted) = toml::Value::try_from(&value) else {
            tracing::warn!(key, "preference value is not TOML-representable; skipping");
            return;
        };
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), converted);
        if let Err(err) = self.persist(&entries) {
            tracing::warn!(key, error = %err, "failed to persist preferences");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use adminkit_core::{StoredParams, load_stored_params, save_stored_params};
    use serde_json::json;

    #[test]
    fn settings_default_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(settings.list.per_page, 10);
        assert!(settings.list.sort_field.is_none());
    }

    #[test]
    fn settings_read_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[list]\nper_page = 25\nsort_field = \"title\"\nsort_order = \"DESC\"\n",
        )
        .unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.list.per_page, 25);

        let defaults = settings.list.list_defaults().unwrap();
        assert_eq!(defaults.per_page, 25);
        assert_eq!(defaults.sort, Some(Sort::desc("title")));
    }

    #[test]
    fn invalid_sort_order_is_a_validation_error() {
        let settings = ListSettings {
            sort_order: "SIDEWAYS".into(),
            ..ListSettings::default()
        };
        assert!(matches!(
            settings.list_defaults(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn preferences_round_trip_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = FilePreferences::new(dir.path().join("preferences.toml"));
        prefs.set("books.list_params", json!({"per_page": 25}));
        assert_eq!(
            prefs.get("books.list_params"),
            Some(json!({"per_page": 25}))
        );
    }

    #[test]
    fn preferences_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");

        let first = FilePreferences::new(&path);
        save_stored_params(
            &first,
            "books",
            &StoredParams {
                sort: Some(Sort::desc("title")),
                per_page: Some(50),
            },
        );
        drop(first);

        let second = FilePreferences::new(&path);
        let stored = load_stored_params(&second, "books");
        assert_eq!(stored.sort, Some(Sort::desc("title")));
        assert_eq!(stored.per_page, Some(50));
    }

    #[test]
    fn malformed_preference_files_start_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        std::fs::write(&path, "not [valid toml").unwrap();

        let prefs = FilePreferences::new(&path);
        assert!(prefs.get("anything").is_none());
    }

    #[test]
    fn unknown_keys_read_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = FilePreferences::new(dir.path().join("preferences.toml"));
        assert!(prefs.get("ghosts.list_params").is_none());
    }
}
