use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use admit_limit::Governor;
use admit_limit::Reason;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use pin_project_lite::pin_project;
use tower::BoxError;
use tower::Service;
use tracing::debug;

use crate::error::AdmitError;
use crate::key::KeyExtractor;

#[derive(Clone, Debug)]
struct GovernorServiceMetrics {
    denied: Counter<u64>,
}

/// Admits requests through a [`Governor`] before they reach the inner service.
///
/// Rejections never wait: a request whose client has exhausted any tier fails
/// immediately with [`AdmitError::TooFast`] and the inner service is not called.
#[derive(Clone, Debug)]
pub struct GovernorService<K, S> {
    inner: S,
    governor: Arc<Governor>,
    extractor: K,
    operation: String,
    instruments: GovernorServiceMetrics,
}

pin_project! {
    /// Response future of [`GovernorService`].
    pub struct ResponseFuture<F> {
        #[pin]
        kind: Kind<F>,
    }
}

pin_project! {
    #[project = KindProj]
    enum Kind<F> {
        Admitted { #[pin] future: F },
        Rejected { error: AdmitError },
    }
}

impl<F, T> Future for ResponseFuture<F>
where
    F: Future<Output = Result<T, BoxError>>,
{
    type Output = Result<T, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().kind.project() {
            KindProj::Admitted { future } => future.poll(cx),
            KindProj::Rejected { error } => Poll::Ready(Err(Box::new(error.clone()))),
        }
    }
}

impl<K, S> GovernorService<K, S> {
    pub fn new(inner: S, governor: Arc<Governor>, extractor: K) -> Self {
        let meter = global::meter("governor_service");
        let instruments = GovernorServiceMetrics {
            denied: meter.u64_counter("admission_denied").build(),
        };

        Self {
            inner,
            governor,
            extractor,
            operation: String::new(),
            instruments,
        }
    }

    /// Name reported in logs and metrics for this protected operation.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    fn reject<F>(&self, error: AdmitError) -> ResponseFuture<F> {
        self.instruments.denied.add(
            1,
            &[
                KeyValue::new("operation", self.operation.clone()),
                KeyValue::new("code", error.code()),
            ],
        );
        ResponseFuture {
            kind: Kind::Rejected { error },
        }
    }
}

impl<K, S, Req> Service<Req> for GovernorService<K, S>
where
    K: KeyExtractor<Req>,
    S: Service<Req, Error = BoxError>,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let Some(client) = self.extractor.extract(&req) else {
            debug!(operation = %self.operation, "rejecting request without a client key");
            return self.reject(AdmitError::UnknownClient);
        };

        match self.governor.check(client.as_str()) {
            ControlFlow::Continue(()) => ResponseFuture {
                kind: Kind::Admitted {
                    future: self.inner.call(req),
                },
            },
            ControlFlow::Break(Reason::Overloaded { retry_after }) => {
                debug!(operation = %self.operation, %client, ?retry_after, "request too fast");
                self.reject(AdmitError::TooFast { retry_after })
            }
        }
    }
}
