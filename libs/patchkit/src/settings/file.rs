use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::{SettingValue, SettingsError, SettingsStore};

/// JSON-document store. Each write rewrites the document through a temp file,
/// fsyncs it, and renames it over the original before returning.
pub struct FileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, SettingValue>>,
}

impl FileStore {
    /// Opens (or lazily creates) the store at `path`.
    ///
    /// An unreadable or corrupt document is logged and treated as empty;
    /// the next write replaces it.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = Self::load(&path);
        tracing::debug!(path = %path.display(), keys = values.len(), "Settings store opened");
        Self {
            path,
            values: RwLock::new(values),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> BTreeMap<String, SettingValue> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Settings unreadable, using defaults");
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Settings corrupt, using defaults");
            BTreeMap::new()
        })
    }

    /// Sibling the document is staged in; never the document itself.
    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    fn persist(&self, values: &BTreeMap<String, SettingValue>) -> Result<(), SettingsError> {
        let encoded = serde_json::to_vec_pretty(values)?;
        let io_err = |source| SettingsError::Write {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.temp_path();
        {
            let mut file = fs::File::create(&tmp).map_err(io_err)?;
            file.write_all(&encoded).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl SettingsStore for FileStore {
    fn read(&self, key: &str) -> Option<SettingValue> {
        self.values.read().get(key).cloned()
    }

    fn write(&self, key: &str, value: Option<SettingValue>) -> Result<(), SettingsError> {
        let mut values = self.values.write();
        let previous = match value {
            Some(v) => values.insert(key.to_owned(), v),
            None => values.remove(key),
        };
        if let Err(e) = self.persist(&values) {
            // Keep memory consistent with what is on disk.
            match previous {
                Some(p) => values.insert(key.to_owned(), p),
                None => values.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = FileStore::open(&path);
        store.set_bool("Patchkit_Tint", true).unwrap();
        store.set_int("Patchkit_Tint_Selection", 2).unwrap();
        drop(store);

        let reopened = FileStore::open(&path);
        assert!(reopened.get_bool("Patchkit_Tint", false));
        assert_eq!(reopened.get_int("Patchkit_Tint_Selection", 0), 2);
    }

    #[test]
    fn corrupt_document_reads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = FileStore::open(&path);
        assert!(store.get_bool("Patchkit_Tint", true));
        store.set_bool("Patchkit_Tint", false).unwrap();
        assert!(!FileStore::open(&path).get_bool("Patchkit_Tint", true));
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("settings.json");
        let store = FileStore::open(&path);
        store.set_string("k", "v").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn temp_file_never_aliases_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.tmp");
        let store = FileStore::open(&path);
        store.set_bool("a", true).unwrap();
        store.set_bool("b", true).unwrap();

        let reopened = FileStore::open(&path);
        assert!(reopened.get_bool("a", false));
        assert!(reopened.get_bool("b", false));
        assert_eq!(store.temp_path(), dir.path().join("settings.tmp.tmp"));
        assert!(!store.temp_path().exists());
    }
}
