use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{SettingValue, SettingsError, SettingsStore};

/// In-process store. Clones share the same backing map, which lets tests
/// model a process restart by building a fresh registry over a clone.
#[derive(Clone, Default)]
pub struct MemoryStore {
    values: Arc<RwLock<HashMap<String, SettingValue>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl SettingsStore for MemoryStore {
    fn read(&self, key: &str) -> Option<SettingValue> {
        self.values.read().get(key).cloned()
    }

    fn write(&self, key: &str, value: Option<SettingValue>) -> Result<(), SettingsError> {
        let mut values = self.values.write();
        match value {
            Some(v) => values.insert(key.to_owned(), v),
            None => values.remove(key),
        };
        Ok(())
    }
}
