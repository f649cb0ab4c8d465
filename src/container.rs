use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::feature::{Feature, FeatureObserver, FeatureState};
use crate::remote::RemoteFeatureFlagSource;
use crate::store::{FeatureAttributes, FeatureStore};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FeatureContainerError {
    #[error("A feature key can not be empty.")]
    EmptyKey,

    #[error("A feature with the key `{0}` is already added to the container.")]
    DuplicateKey(String),

    #[error("A feature with the key `{0}` could not be found.")]
    NotFound(String),
}

/// The registry owning a set of features, bound to one shared store.
///
/// Registration pulls any previously persisted record back into the feature,
/// and attaches an observer that writes every subsequent override change
/// back to the store. The container is a monitor: membership operations and
/// the lookups they race with serialize on one mutex per instance.
pub struct FeatureContainer {
    features: Mutex<HashMap<String, Arc<Feature>>>,
    store: Arc<dyn FeatureStore>,
}

impl FeatureContainer {
    pub fn new(store: Arc<dyn FeatureStore>) -> FeatureContainer {
        FeatureContainer {
            features: Mutex::new(HashMap::new()),
            store,
        }
    }

    pub fn with_features(
        features: impl IntoIterator<Item = Arc<Feature>>,
        store: Arc<dyn FeatureStore>,
    ) -> Result<FeatureContainer, FeatureContainerError> {
        let container = FeatureContainer::new(store);
        container.add_features(features)?;
        Ok(container)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Feature>>> {
        self.features
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a feature under its key.
    ///
    /// If the store holds a record for the key, both the override state and
    /// the default are restored from it, so a feature re-registered after a
    /// removal (or in a later process) picks up where it left off.
    #[tracing::instrument(skip(self))]
    pub fn add_feature(&self, feature: Arc<Feature>) -> Result<(), FeatureContainerError> {
        let mut features = self.lock();
        self.register(&mut features, feature)
    }

    /// Adds each feature in order, stopping at the first failure. Features
    /// added before the failing one stay registered.
    pub fn add_features(
        &self,
        features: impl IntoIterator<Item = Arc<Feature>>,
    ) -> Result<(), FeatureContainerError> {
        let mut registered = self.lock();
        for feature in features {
            self.register(&mut registered, feature)?;
        }
        Ok(())
    }

    fn register(
        &self,
        features: &mut HashMap<String, Arc<Feature>>,
        feature: Arc<Feature>,
    ) -> Result<(), FeatureContainerError> {
        if feature.key().is_empty() {
            return Err(FeatureContainerError::EmptyKey);
        }
        if features.contains_key(feature.key()) {
            return Err(FeatureContainerError::DuplicateKey(feature.key().to_owned()));
        }

        if let Some(attributes) = self.store.read(feature.key()) {
            tracing::debug!(
                key = feature.key(),
                state = %attributes.state,
                default_value = attributes.default_value,
                "Restoring a persisted feature record"
            );
            feature.restore(attributes.state, attributes.default_value);
        }

        feature.set_observer(Arc::new(StoreWriter {
            store: Arc::clone(&self.store),
        }));
        features.insert(feature.key().to_owned(), feature);

        Ok(())
    }

    /// Forgets the feature if it is registered. The persisted record is left
    /// alone so a later re-registration can recover the override.
    #[tracing::instrument(skip(self))]
    pub fn remove_feature(&self, feature: &Feature) {
        self.lock().remove(feature.key());
    }

    pub fn feature_for_key(&self, key: &str) -> Result<Arc<Feature>, FeatureContainerError> {
        self.lock()
            .get(key)
            .cloned()
            .ok_or_else(|| FeatureContainerError::NotFound(key.to_owned()))
    }

    /// The effective value for a key; `false` when the key is unregistered.
    pub fn is_enabled(&self, key: &str) -> bool {
        self.lock().get(key).is_some_and(|feature| feature.enabled())
    }

    /// A snapshot of the registered features, sorted by key so listings are
    /// stable between calls.
    pub fn all_features(&self) -> Vec<Arc<Feature>> {
        let mut features: Vec<Arc<Feature>> = self.lock().values().cloned().collect();
        features.sort_by(|a, b| a.key().cmp(b.key()));
        features
    }

    /// Pulls fresh default values from a remote flag service and applies them
    /// to the matching registered features.
    ///
    /// Only the defaults move: an active in-memory override is preserved.
    /// The persisted record, however, is reset to `(Default, new_default)` so
    /// the fresh default takes effect on the next launch unless the user
    /// re-overrides. Unregistered keys in the mapping are ignored.
    #[tracing::instrument(skip(self, source))]
    pub async fn reconcile_from_remote<S: RemoteFeatureFlagSource>(&self, source: &S) {
        let mapping = source.fetch().await;

        let features = self.lock();
        for (key, default_value) in mapping {
            let Some(feature) = features.get(&key) else {
                tracing::trace!(key = %key, "Ignoring a remote default for an unregistered key");
                continue;
            };

            feature.update_default_state(default_value);
            self.store.write(
                &key,
                FeatureAttributes {
                    state: FeatureState::Default,
                    default_value,
                },
            );
            tracing::debug!(key = %key, default_value, "Applied a remote default");
        }
    }
}

impl std::fmt::Debug for FeatureContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.debug_struct("FeatureContainer")
            .field("features", &self.lock().len())
            .finish_non_exhaustive()
    }
}

/// The observer attached at registration: every override write lands in the
/// store as a fresh `(state, default)` record for the feature's key.
struct StoreWriter {
    store: Arc<dyn FeatureStore>,
}

impl FeatureObserver for StoreWriter {
    fn on_state_changed(&self, feature: &Feature) {
        self.store.write(
            feature.key(),
            FeatureAttributes {
                state: feature.state(),
                default_value: feature.default_state(),
            },
        );
    }
}
