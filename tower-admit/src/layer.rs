use std::sync::Arc;

use admit_limit::Governor;
use tower::Layer;

use crate::key::RealIp;
use crate::service::GovernorService;

/// Applies per-client quota admission to requests.
///
/// Clones share the same [`Governor`], so every route wrapped by clones of one layer
/// draws from the same per-client quotas.
#[derive(Debug, Clone)]
pub struct GovernorLayer<K = RealIp> {
    governor: Arc<Governor>,
    extractor: K,
    operation: String,
}

impl GovernorLayer<RealIp> {
    /// Create a GovernorLayer keyed by [`RealIp`].
    pub fn new(governor: Arc<Governor>) -> Self {
        GovernorLayer {
            governor,
            extractor: RealIp,
            operation: String::new(),
        }
    }
}

impl<K> GovernorLayer<K> {
    /// Replace the client key extractor.
    pub fn with_extractor<K2>(self, extractor: K2) -> GovernorLayer<K2> {
        GovernorLayer {
            governor: self.governor,
            extractor,
            operation: self.operation,
        }
    }

    /// Name the protected operation in logs and metrics.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    pub fn governor(&self) -> &Arc<Governor> {
        &self.governor
    }
}

impl<K, S> Layer<S> for GovernorLayer<K>
where
    K: Clone,
{
    type Service = GovernorService<K, S>;

    fn layer(&self, service: S) -> Self::Service {
        GovernorService::new(service, Arc::clone(&self.governor), self.extractor.clone())
            .with_operation(self.operation.clone())
    }
}
