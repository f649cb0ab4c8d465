mod in_memory;
mod preferences;

pub use in_memory::InMemoryFeatureStore;
pub use preferences::{PreferencesFeatureStore, PreferencesStoreError};

use crate::FeatureState;

/// The unit persisted per feature key: the override state and the default
/// value it was last seen with, round-tripped as one record.
#[derive(Debug, PartialEq, Eq, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct FeatureAttributes {
    pub state: FeatureState,
    pub default_value: bool,
}

/// Persists feature records, keyed by feature key.
///
/// A missing key is a normal result, not an error, and implementations must
/// treat records they cannot decode the same way. Writes upsert; no
/// cross-key transactionality is expected. Stores are shared between
/// containers as `Arc<dyn FeatureStore>` and outlive any one of them.
pub trait FeatureStore: Send + Sync {
    fn read(&self, key: &str) -> Option<FeatureAttributes>;
    fn write(&self, key: &str, attributes: FeatureAttributes);
}
