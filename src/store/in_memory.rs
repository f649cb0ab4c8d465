use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::store::{FeatureAttributes, FeatureStore};

/// A process-local store. Records are lost when the process ends, which is
/// exactly what tests and previews want.
#[derive(Default)]
pub struct InMemoryFeatureStore {
    cache: RwLock<HashMap<String, FeatureAttributes>>,
}

impl InMemoryFeatureStore {
    pub fn new() -> InMemoryFeatureStore {
        InMemoryFeatureStore::default()
    }
}

impl FeatureStore for InMemoryFeatureStore {
    fn read(&self, key: &str) -> Option<FeatureAttributes> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }

    fn write(&self, key: &str, attributes: FeatureAttributes) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), attributes);
    }
}
