use std::collections::HashMap;

/// An external service supplying fresh default values, keyed by feature key.
///
/// How the mapping is obtained is entirely the implementer's business; the
/// container only consumes the result, through
/// [`FeatureContainer::reconcile_from_remote`](crate::FeatureContainer::reconcile_from_remote).
pub trait RemoteFeatureFlagSource: Send + Sync {
    fn fetch(&self) -> impl std::future::Future<Output = HashMap<String, bool>> + Send;
}
