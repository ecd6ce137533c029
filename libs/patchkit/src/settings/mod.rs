//! Configuration Store - persisted per-module settings.
//!
//! The store is a flat key/value namespace. Every write is durable before the
//! call returns. Reads never fail: a missing key, a value of the wrong type, or
//! an unreadable backing document all fall back to the caller's default.

mod file;
mod keys;
mod memory;
mod module_config;

pub use file::FileStore;
pub use keys::SettingsKeys;
pub use memory::MemoryStore;
pub use module_config::{Choice, ModuleConfig};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to write settings to '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A persisted value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl SettingValue {
    fn kind(&self) -> &'static str {
        match self {
            SettingValue::Bool(_) => "bool",
            SettingValue::Int(_) => "int",
            SettingValue::Str(_) => "string",
        }
    }
}

/// Synchronous, immediately durable key/value store.
///
/// Implementors provide raw `read` / `write`; the typed accessors are derived.
pub trait SettingsStore: Send + Sync {
    fn read(&self, key: &str) -> Option<SettingValue>;

    /// Writes (`Some`) or deletes (`None`) a key.
    ///
    /// # Errors
    /// Returns [`SettingsError`] when the value could not be made durable.
    fn write(&self, key: &str, value: Option<SettingValue>) -> Result<(), SettingsError>;

    fn contains(&self, key: &str) -> bool {
        self.read(key).is_some()
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.read(key) {
            Some(SettingValue::Bool(v)) => v,
            other => mismatch(key, "bool", other.as_ref(), default),
        }
    }

    fn get_int(&self, key: &str, default: i64) -> i64 {
        match self.read(key) {
            Some(SettingValue::Int(v)) => v,
            other => mismatch(key, "int", other.as_ref(), default),
        }
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        match self.read(key) {
            Some(SettingValue::Str(v)) => v,
            other => mismatch(key, "string", other.as_ref(), default.to_owned()),
        }
    }

    /// # Errors
    /// See [`SettingsStore::write`].
    fn set_bool(&self, key: &str, value: bool) -> Result<(), SettingsError> {
        self.write(key, Some(SettingValue::Bool(value)))
    }

    /// # Errors
    /// See [`SettingsStore::write`].
    fn set_int(&self, key: &str, value: i64) -> Result<(), SettingsError> {
        self.write(key, Some(SettingValue::Int(value)))
    }

    /// # Errors
    /// See [`SettingsStore::write`].
    fn set_string(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.write(key, Some(SettingValue::Str(value.to_owned())))
    }

    /// # Errors
    /// See [`SettingsStore::write`].
    fn remove(&self, key: &str) -> Result<(), SettingsError> {
        self.write(key, None)
    }
}

fn mismatch<T>(key: &str, expected: &str, found: Option<&SettingValue>, default: T) -> T {
    if let Some(found) = found {
        tracing::warn!(
            key,
            expected,
            found = found.kind(),
            "Persisted setting has unexpected type, using default"
        );
    }
    default
}
