use std::sync::{Arc, PoisonError, RwLock};

/// Any state except `Default` means the feature has been overridden.
///
/// Persisted as an integer tag, so the variants are fixed: `0` is `Default`,
/// `1` is `On`, `2` is `Off`. Unknown tags fail deserialization, which the
/// stores treat as a missing record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FeatureState {
    #[default]
    Default = 0,
    On = 1,
    Off = 2,
}

impl From<FeatureState> for u8 {
    fn from(state: FeatureState) -> u8 {
        state as u8
    }
}

impl TryFrom<u8> for FeatureState {
    type Error = UnknownStateTag;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(FeatureState::Default),
            1 => Ok(FeatureState::On),
            2 => Ok(FeatureState::Off),
            other => Err(UnknownStateTag(other)),
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("`{0}` is not a known feature state tag")]
pub struct UnknownStateTag(u8);

impl std::fmt::Display for FeatureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            FeatureState::On => write!(f, "On"),
            FeatureState::Off => write!(f, "Off"),
            FeatureState::Default => write!(f, "Default"),
        }
    }
}

/// Advisory rendering hint for settings screens: overridden features stand
/// out regardless of their effective value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorHint {
    Overridden,
    DefaultOn,
    DefaultOff,
}

impl std::fmt::Display for ColorHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            ColorHint::Overridden => write!(f, "\u{1f49b}"),
            ColorHint::DefaultOn => write!(f, "\u{1f49a}"),
            ColorHint::DefaultOff => write!(f, "\u{1f5a4}"),
        }
    }
}

/// Receives a synchronous callback after a feature's override state changes.
///
/// The container registers a store-writing observer when a feature is added;
/// the callback runs on the mutating thread, once per write.
pub(crate) trait FeatureObserver: Send + Sync {
    fn on_state_changed(&self, feature: &Feature);
}

struct OverrideCell {
    state: FeatureState,
    default_state: bool,
}

/// One named boolean flag.
///
/// The effective value, [`Feature::enabled`], is derived from the override
/// state and the default: `On` and `Off` win outright, `Default` falls back
/// to `default_state`. It is never stored independently.
///
/// `key`, `title`, `description`, `requires_restart`, and `is_local` are
/// fixed at construction. The override state and the default are interior
/// mutable so that handles can be shared between the container and a UI.
pub struct Feature {
    key: String,
    title: String,
    description: String,
    requires_restart: bool,
    is_local: bool,
    cell: RwLock<OverrideCell>,
    observer: RwLock<Option<Arc<dyn FeatureObserver>>>,
}

impl Feature {
    /// A feature with an `Off` default and no metadata beyond its key.
    pub fn new(key: impl Into<String>) -> Feature {
        Feature::builder(key).build()
    }

    pub fn builder(key: impl Into<String>) -> FeatureBuilder {
        FeatureBuilder {
            key: key.into(),
            default_state: false,
            title: None,
            description: String::new(),
            requires_restart: false,
            is_local: true,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The host application must restart before a change takes effect.
    /// Advisory only, nothing in the core enforces it.
    pub fn requires_restart(&self) -> bool {
        self.requires_restart
    }

    /// False when the default is expected to be filled in by a remote
    /// flag service rather than the application itself.
    pub fn is_local(&self) -> bool {
        self.is_local
    }

    pub fn state(&self) -> FeatureState {
        self.cell
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    /// Replaces the override state and notifies the registered observer,
    /// synchronously, after the new value is in place. Fires on every write,
    /// including writes that store the value already present.
    pub fn set_state(&self, new_state: FeatureState) {
        {
            let mut cell = self.cell.write().unwrap_or_else(PoisonError::into_inner);
            cell.state = new_state;
        }

        tracing::trace!(key = %self.key, state = %new_state, "Feature override state changed");

        let observer = self
            .observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(observer) = observer {
            observer.on_state_changed(self);
        }
    }

    pub fn default_state(&self) -> bool {
        self.cell
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .default_state
    }

    /// The effective value consumed by application logic.
    pub fn enabled(&self) -> bool {
        let cell = self.cell.read().unwrap_or_else(PoisonError::into_inner);
        match cell.state {
            FeatureState::On => true,
            FeatureState::Off => false,
            FeatureState::Default => cell.default_state,
        }
    }

    pub fn color_hint(&self) -> ColorHint {
        let cell = self.cell.read().unwrap_or_else(PoisonError::into_inner);
        match (cell.state, cell.default_state) {
            (FeatureState::On | FeatureState::Off, _) => ColorHint::Overridden,
            (FeatureState::Default, true) => ColorHint::DefaultOn,
            (FeatureState::Default, false) => ColorHint::DefaultOff,
        }
    }

    /// Called by the container when a remote source supplies a fresh default.
    /// Deliberately does not fire the state-change observer: a default refresh
    /// is not an override write.
    pub(crate) fn update_default_state(&self, new_default: bool) {
        let mut cell = self.cell.write().unwrap_or_else(PoisonError::into_inner);
        cell.default_state = new_default;
    }

    /// Restores both halves of a persisted record without notifying anyone.
    /// Only used during registration, before an observer is attached.
    pub(crate) fn restore(&self, state: FeatureState, default_state: bool) {
        let mut cell = self.cell.write().unwrap_or_else(PoisonError::into_inner);
        cell.state = state;
        cell.default_state = default_state;
    }

    pub(crate) fn set_observer(&self, observer: Arc<dyn FeatureObserver>) {
        let mut slot = self.observer.write().unwrap_or_else(PoisonError::into_inner);
        slot.replace(observer);
    }
}

impl std::fmt::Debug for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.debug_struct("Feature")
            .field("key", &self.key)
            .field("state", &self.state())
            .field("default_state", &self.default_state())
            .field("enabled", &self.enabled())
            .finish_non_exhaustive()
    }
}

pub struct FeatureBuilder {
    key: String,
    default_state: bool,
    title: Option<String>,
    description: String,
    requires_restart: bool,
    is_local: bool,
}

impl FeatureBuilder {
    pub fn default_state(mut self, default_state: bool) -> Self {
        self.default_state = default_state;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn requires_restart(mut self, requires_restart: bool) -> Self {
        self.requires_restart = requires_restart;
        self
    }

    pub fn is_local(mut self, is_local: bool) -> Self {
        self.is_local = is_local;
        self
    }

    pub fn build(self) -> Feature {
        Feature {
            title: self.title.unwrap_or_else(|| self.key.clone()),
            key: self.key,
            description: self.description,
            requires_restart: self.requires_restart,
            is_local: self.is_local,
            cell: RwLock::new(OverrideCell {
                state: FeatureState::Default,
                default_state: self.default_state,
            }),
            observer: RwLock::new(None),
        }
    }
}
