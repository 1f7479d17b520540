use std::time::Duration;

use tower::BoxError;

/// Errors produced by the admission middleware.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdmitError {
    /// Some quota tier for this client is exhausted.
    ///
    /// When the `axum` feature is enabled, this converts to `429 Too Many Requests`
    /// with a `Retry-After` header and the error code `TOO_FAST`.
    #[error("Too many requests; retry after {retry_after:?}")]
    TooFast {
        /// How long until the exhausted tier admits again.
        retry_after: Duration,
    },

    /// No client key could be derived from the request.
    ///
    /// When the `axum` feature is enabled, this converts to `500 Internal Server Error`.
    #[error("Unable to identify the requesting client")]
    UnknownClient,

    /// An unexpected error occurred in the inner service.
    ///
    /// The string contains the `Display` representation of the inner error.
    #[error("Internal service error: {0}")]
    Inner(String),
}

impl AdmitError {
    /// Machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TooFast { .. } => "TOO_FAST",
            Self::UnknownClient => "UNKNOWN_CLIENT",
            Self::Inner(_) => "INTERNAL_ERROR",
        }
    }

    /// Recover an `AdmitError` from a boxed service error, wrapping anything else.
    pub fn from_boxed(err: BoxError) -> Self {
        match err.downcast::<AdmitError>() {
            Ok(admit) => *admit,
            Err(other) => Self::Inner(other.to_string()),
        }
    }
}

#[cfg(feature = "axum")]
#[derive(serde::Serialize)]
struct ErrorBody {
    ok: bool,
    error: &'static str,
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AdmitError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, retry_after) = match self {
            Self::TooFast { retry_after } => (StatusCode::TOO_MANY_REQUESTS, Some(retry_after)),
            Self::UnknownClient | Self::Inner(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };
        let body = ErrorBody {
            ok: false,
            error: self.code(),
        };

        let mut response = (status, axum::Json(body)).into_response();
        if let Some(retry_after) = retry_after {
            // Whole seconds, rounded up so clients never come back early.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response.headers_mut().insert(
                axum::http::header::RETRY_AFTER,
                axum::http::HeaderValue::from(secs.max(1)),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let too_fast = AdmitError::TooFast {
            retry_after: Duration::from_secs(1),
        };
        assert_eq!(too_fast.code(), "TOO_FAST");
        assert_eq!(AdmitError::UnknownClient.code(), "UNKNOWN_CLIENT");
        assert_eq!(AdmitError::Inner("boom".into()).code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_from_boxed() {
        let boxed: BoxError = Box::new(AdmitError::UnknownClient);
        assert!(matches!(
            AdmitError::from_boxed(boxed),
            AdmitError::UnknownClient
        ));

        let boxed: BoxError = "database unavailable".into();
        match AdmitError::from_boxed(boxed) {
            AdmitError::Inner(msg) => assert_eq!(msg, "database unavailable"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(feature = "axum")]
    #[test]
    fn test_too_fast_response() {
        use axum::http::StatusCode;
        use axum::response::IntoResponse;

        let response = AdmitError::TooFast {
            retry_after: Duration::from_millis(1_500),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[axum::http::header::RETRY_AFTER], "2");
    }
}
