use std::future::Future;
use std::sync::Arc;

use admit_limit::Suppressor;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use tokio::task::JoinHandle;
use tower::BoxError;
use tracing::warn;

/// Persistence collaborator that owns document view counts.
pub trait ViewSink: Send + Sync + 'static {
    fn increment_views(&self, document: &str) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// Counts a document view at most once per cool-down for each client.
///
/// The increment runs as a detached task; its failures are logged and never reach
/// the request that triggered it.
#[derive(Debug)]
pub struct ViewRecorder<S> {
    suppressor: Arc<Suppressor>,
    sink: Arc<S>,
    suppressed: Counter<u64>,
}

impl<S> Clone for ViewRecorder<S> {
    fn clone(&self) -> Self {
        Self {
            suppressor: Arc::clone(&self.suppressor),
            sink: Arc::clone(&self.sink),
            suppressed: self.suppressed.clone(),
        }
    }
}

impl<S> ViewRecorder<S>
where
    S: ViewSink,
{
    pub fn new(suppressor: Arc<Suppressor>, sink: Arc<S>) -> Self {
        let suppressed = global::meter("view_recorder")
            .u64_counter("views_suppressed")
            .build();

        Self {
            suppressor,
            sink,
            suppressed,
        }
    }

    /// Record that `client` read `document`.
    ///
    /// Returns the spawned increment task, or `None` when the view was a repeat.
    /// Must be called from within a tokio runtime.
    pub fn record(&self, document: &str, client: &str) -> Option<JoinHandle<()>> {
        if !self.suppressor.should_apply(document, client) {
            self.suppressed.add(1, &[]);
            return None;
        }

        let sink = Arc::clone(&self.sink);
        let document = document.to_owned();
        Some(tokio::spawn(async move {
            if let Err(error) = sink.increment_views(&document).await {
                warn!(%document, %error, "failed to increment document views");
            }
        }))
    }
}
