//! View preference persistence
//!
//! Dashboard views remember their filter selections (which categories are
//! toggled on, which chart mode is active) across sessions. Preferences
//! live in a single JSON file under the XDG state directory, one top-level
//! key per view.
//!
//! The store is tolerant by design: a missing file, an unreadable file, or
//! a value that no longer matches the expected shape all read back as "no
//! saved preference" instead of an error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::config::Config;
use crate::error::Result;

/// JSON-file-backed preference store, keyed per view
pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    /// Open the store at the default XDG state location
    pub fn open_default() -> Self {
        Self::with_path(Config::state_dir().join("prefs.json"))
    }

    /// Open a store at a specific path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file backing this store
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved value for a view key.
    ///
    /// Returns `None` when nothing was saved or the saved value no longer
    /// deserializes to `T`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entries = self.read_entries();
        let value = entries.get(key)?;
        serde_json::from_value(value.clone()).ok()
    }

    /// Save a value under a view key, preserving other keys
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let mut entries = self.read_entries();
        entries.insert(key.to_string(), serde_json::to_value(value)?);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }

    fn read_entries(&self) -> BTreeMap<String, serde_json::Value> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }
}

/// Drop saved selections that no longer exist in the available set.
///
/// Used when restoring a category filter: a selection saved against a
/// catalog state that has since changed keeps only its still-valid entries.
pub fn reconcile_selection(saved: &[String], available: &[String]) -> Vec<String> {
    saved
        .iter()
        .filter(|s| available.contains(s))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct ViewPrefs {
        selected: Vec<String>,
        stacked: bool,
    }

    fn temp_store() -> (tempfile::TempDir, PrefsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PrefsStore::with_path(dir.path().join("prefs.json"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_reads_as_none() {
        let (_dir, store) = temp_store();
        assert!(store.load::<ViewPrefs>("insights").is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let (_dir, store) = temp_store();
        let prefs = ViewPrefs {
            selected: vec!["OBSERVABILITY".to_string()],
            stacked: true,
        };
        store.save("insights", &prefs).unwrap();
        assert_eq!(store.load::<ViewPrefs>("insights"), Some(prefs));
    }

    #[test]
    fn test_keys_are_independent() {
        let (_dir, store) = temp_store();
        store.save("a", &vec![1, 2]).unwrap();
        store.save("b", &"mode").unwrap();
        assert_eq!(store.load::<Vec<i32>>("a"), Some(vec![1, 2]));
        assert_eq!(store.load::<String>("b"), Some("mode".to_string()));
    }

    #[test]
    fn test_shape_mismatch_reads_as_none() {
        let (_dir, store) = temp_store();
        store.save("insights", &42).unwrap();
        assert!(store.load::<ViewPrefs>("insights").is_none());
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let (_dir, store) = temp_store();
        std::fs::write(store.path(), "not json").unwrap();
        assert!(store.load::<ViewPrefs>("insights").is_none());
        // Saving over a corrupt file recovers it
        store.save("insights", &1).unwrap();
        assert_eq!(store.load::<i32>("insights"), Some(1));
    }

    #[test]
    fn test_reconcile_selection() {
        let saved = vec!["A".to_string(), "GONE".to_string(), "B".to_string()];
        let available = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        assert_eq!(
            reconcile_selection(&saved, &available),
            vec!["A".to_string(), "B".to_string()]
        );
    }
}
