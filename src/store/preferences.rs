use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::store::{FeatureAttributes, FeatureStore};

const XDG_PREFIX: &str = "dev.flagon";
const XDG_STORAGE_FILENAME: &str = "features.json";

#[derive(thiserror::Error, Debug)]
pub enum PreferencesStoreError {
    #[error("No HOME is available")]
    NoHome,

    #[error("The storage location has no parent directory")]
    LocationHasNoParent,

    #[error("Creating the storage file `{0}` failed: {1}")]
    Create(PathBuf, std::io::Error),
}

/// A durable store backed by a single JSON document in the user's state
/// directory, one self-describing record per feature key.
///
/// Reads and writes never fail from the container's point of view: a file
/// that is missing, unreadable, or undecodable reads as "no record", and
/// failed writes are logged and dropped. The document is replaced atomically
/// through a temp file so a crashed write never leaves a torn file behind.
pub struct PreferencesFeatureStore {
    location: PathBuf,
    directory: PathBuf,
    write_guard: Mutex<()>,
}

impl PreferencesFeatureStore {
    #[tracing::instrument]
    pub fn new(location: PathBuf) -> Option<Self> {
        Some(Self {
            directory: location.parent()?.to_owned(),
            location,
            write_guard: Mutex::new(()),
        })
    }

    pub fn try_default() -> Result<Self, PreferencesStoreError> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix(XDG_PREFIX);

        let file = xdg_dirs
            .place_state_file(XDG_STORAGE_FILENAME)
            .map_err(|e| {
                match xdg_dirs
                    .get_state_file(XDG_STORAGE_FILENAME)
                    .ok_or(PreferencesStoreError::NoHome)
                {
                    Ok(loc) => PreferencesStoreError::Create(loc, e),
                    Err(e) => e,
                }
            })?;

        Self::new(file).ok_or(PreferencesStoreError::LocationHasNoParent)
    }

    /// Records are kept as raw JSON values so one undecodable record does
    /// not take down the rest of the document.
    fn load_records(&self) -> HashMap<String, serde_json::Value> {
        let contents = match std::fs::read(&self.location) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::trace!(location = ?self.location, %e, "No readable feature storage");
                return HashMap::new();
            }
        };

        serde_json::from_slice(&contents).unwrap_or_else(|e| {
            tracing::debug!(location = ?self.location, %e, "Discarding undecodable feature storage");
            HashMap::new()
        })
    }

    fn persist_records(&self, records: HashMap<String, serde_json::Value>) {
        let json = match serde_json::to_string_pretty(&records) {
            Ok(json) => json,
            Err(e) => {
                tracing::debug!(%e, "Serializing feature storage failed");
                return;
            }
        };

        let result = tempfile::NamedTempFile::new_in(&self.directory)
            .and_then(|mut tempfile| {
                tempfile.write_all(json.as_bytes())?;
                Ok(tempfile)
            })
            .and_then(|tempfile| {
                tempfile
                    .persist(&self.location)
                    .map_err(std::io::Error::from)
            });

        match result {
            Ok(_) => tracing::trace!(location = ?self.location, "Feature storage persisted"),
            Err(e) => {
                tracing::debug!(location = ?self.location, %e, "Persisting feature storage failed");
            }
        }
    }
}

impl FeatureStore for PreferencesFeatureStore {
    #[tracing::instrument(skip(self))]
    fn read(&self, key: &str) -> Option<FeatureAttributes> {
        let _guard = self
            .write_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let value = self.load_records().remove(key)?;

        serde_json::from_value(value)
            .inspect_err(|e| {
                tracing::debug!(key, %e, "Discarding undecodable feature record");
            })
            .ok()
    }

    #[tracing::instrument(skip(self))]
    fn write(&self, key: &str, attributes: FeatureAttributes) {
        let _guard = self
            .write_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut records = self.load_records();

        match serde_json::to_value(attributes) {
            Ok(value) => {
                records.insert(key.to_owned(), value);
            }
            Err(e) => {
                tracing::debug!(key, %e, "Serializing a feature record failed");
                return;
            }
        }

        self.persist_records(records);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FeatureState;

    fn store_in(dir: &tempfile::TempDir) -> PreferencesFeatureStore {
        PreferencesFeatureStore::new(dir.path().join(XDG_STORAGE_FILENAME)).unwrap()
    }

    #[test]
    fn round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let attrs = FeatureAttributes {
            state: FeatureState::Off,
            default_value: true,
        };

        store.write("dark_mode", attrs);

        assert_eq!(store.read("dark_mode"), Some(attrs));
    }

    #[test]
    fn missing_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert_eq!(store.read("anything"), None);
    }

    #[test]
    fn corrupt_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join(XDG_STORAGE_FILENAME);
        std::fs::write(&location, b"}{ not json").unwrap();
        let store = PreferencesFeatureStore::new(location).unwrap();

        assert_eq!(store.read("anything"), None);
    }

    #[test]
    fn corrupt_record_reads_as_absent_without_harming_others() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join(XDG_STORAGE_FILENAME);
        std::fs::write(
            &location,
            br#"{"bad": {"state": 9, "default_value": "x"}, "good": {"state": 1, "default_value": false}}"#,
        )
        .unwrap();
        let store = PreferencesFeatureStore::new(location).unwrap();

        assert_eq!(store.read("bad"), None);
        assert_eq!(
            store.read("good"),
            Some(FeatureAttributes {
                state: FeatureState::On,
                default_value: false,
            })
        );
    }

    #[test]
    fn writes_preserve_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let first = FeatureAttributes {
            state: FeatureState::On,
            default_value: false,
        };
        let second = FeatureAttributes {
            state: FeatureState::Default,
            default_value: true,
        };

        store.write("a", first);
        store.write("b", second);

        assert_eq!(store.read("a"), Some(first));
        assert_eq!(store.read("b"), Some(second));
    }

    #[test]
    fn a_location_without_a_parent_is_rejected() {
        assert!(PreferencesFeatureStore::new(PathBuf::from("/")).is_none());
    }
}
