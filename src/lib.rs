mod container;
mod feature;
mod remote;
pub mod store;

pub use container::{FeatureContainer, FeatureContainerError};
pub use feature::{ColorHint, Feature, FeatureBuilder, FeatureState};
pub use remote::RemoteFeatureFlagSource;
pub use store::{FeatureAttributes, FeatureStore, InMemoryFeatureStore, PreferencesFeatureStore};

#[cfg(test)]
mod test;
