use std::sync::Arc;

use crate::store::{FeatureAttributes, PreferencesFeatureStore};
use crate::{Feature, FeatureContainer, FeatureState, FeatureStore, InMemoryFeatureStore};

#[test]
fn overriding_dark_mode_round_trips_through_the_store() {
    super::init_tracing();

    let store = Arc::new(InMemoryFeatureStore::new());
    let container = FeatureContainer::new(store.clone());
    let dark_mode = Arc::new(Feature::builder("dark_mode").default_state(true).build());
    container.add_feature(dark_mode.clone()).unwrap();

    assert!(container.is_enabled("dark_mode"));

    dark_mode.set_state(FeatureState::Off);
    assert!(!container.is_enabled("dark_mode"));
    assert_eq!(
        store.read("dark_mode"),
        Some(FeatureAttributes {
            state: FeatureState::Off,
            default_value: true,
        })
    );

    dark_mode.set_state(FeatureState::Default);
    assert!(container.is_enabled("dark_mode"));
    assert_eq!(
        store.read("dark_mode"),
        Some(FeatureAttributes {
            state: FeatureState::Default,
            default_value: true,
        })
    );
}

#[test]
fn containers_sharing_a_store_see_each_others_overrides() {
    super::init_tracing();

    let store = Arc::new(InMemoryFeatureStore::new());

    let container_a = FeatureContainer::new(store.clone());
    let feature = Arc::new(Feature::new("x"));
    container_a.add_feature(feature.clone()).unwrap();
    feature.set_state(FeatureState::On);

    let container_b = FeatureContainer::new(store);
    container_b.add_feature(Arc::new(Feature::new("x"))).unwrap();

    let restored = container_b.feature_for_key("x").unwrap();
    assert_eq!(restored.state(), FeatureState::On);
    assert!(restored.enabled());
}

#[test]
fn overrides_survive_a_restart_with_the_preferences_store() {
    super::init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("features.json");

    {
        let store = Arc::new(PreferencesFeatureStore::new(location.clone()).unwrap());
        let container = FeatureContainer::new(store);
        let feature = Arc::new(Feature::builder("beta_banner").default_state(false).build());
        container.add_feature(feature.clone()).unwrap();
        feature.set_state(FeatureState::On);
    }

    // A fresh store at the same location stands in for the next launch.
    let store = Arc::new(PreferencesFeatureStore::new(location).unwrap());
    let container = FeatureContainer::new(store);
    container
        .add_feature(Arc::new(Feature::new("beta_banner")))
        .unwrap();

    assert!(container.is_enabled("beta_banner"));
    assert_eq!(
        container.feature_for_key("beta_banner").unwrap().state(),
        FeatureState::On
    );
}

#[test]
fn with_features_registers_the_initial_set() {
    super::init_tracing();

    let container = FeatureContainer::with_features(
        [
            Arc::new(Feature::builder("show_rating").default_state(true).build()),
            Arc::new(
                Feature::builder("background_color")
                    .title("App background color")
                    .build(),
            ),
            Arc::new(
                Feature::builder("app_filter")
                    .default_state(true)
                    .title("App filters")
                    .description("Enabling filter by applications.")
                    .build(),
            ),
        ],
        Arc::new(InMemoryFeatureStore::new()),
    )
    .unwrap();

    let keys: Vec<String> = container
        .all_features()
        .iter()
        .map(|f| f.key().to_owned())
        .collect();
    assert_eq!(keys, vec!["app_filter", "background_color", "show_rating"]);
    assert!(container.is_enabled("show_rating"));
    assert!(!container.is_enabled("background_color"));
}
