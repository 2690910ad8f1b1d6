use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use crate::types::exchange::ExchangeId;

#[derive(Error, Debug)]
pub enum Error {
    // Upstream Fetch Errors
    #[error("HTTP request to {exchange} failed: {message}")]
    Http {
        exchange: ExchangeId,
        message: String,
    },

    #[error("{exchange} responded with HTTP {status}")]
    UpstreamStatus {
        exchange: ExchangeId,
        status: u16,
    },

    #[error("Request to {0} timed out")]
    Timeout(ExchangeId),

    #[error("FX rate fetch failed: {0}")]
    FxFetch(String),

    // Shape Errors
    #[error("Unexpected payload shape from {exchange}: {details}")]
    UnexpectedShape {
        exchange: ExchangeId,
        details: String,
    },

    #[error("{exchange} rejected the request: {code}")]
    UpstreamRejected {
        exchange: ExchangeId,
        code: String,
    },

    // Client Input Errors
    #[error("Invalid market selector: {0}")]
    InvalidSelector(String),

    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("Invalid query parameter: {0}")]
    InvalidQuery(String),

    // Rate Limiting
    #[error("Rate limit exceeded, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    // System Errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("Task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short label used as the `reason` metric dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::Http { .. } => "http",
            Error::UpstreamStatus { .. } => "status",
            Error::Timeout(_) => "timeout",
            Error::FxFetch(_) => "fx",
            Error::UnexpectedShape { .. } => "shape",
            Error::UpstreamRejected { .. } => "rejected",
            Error::InvalidSelector(_) | Error::UnknownExchange(_) | Error::InvalidQuery(_) => "input",
            Error::RateLimited { .. } => "rate_limited",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
            Error::Metrics(_) => "metrics",
            Error::TaskFailed(_) => "task",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidSelector(_) | Error::UnknownExchange(_) | Error::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Http { .. }
            | Error::UpstreamStatus { .. }
            | Error::Timeout(_)
            | Error::FxFetch(_)
            | Error::UnexpectedShape { .. }
            | Error::UpstreamRejected { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<prometheus::Error> for Error {
    fn from(e: prometheus::Error) -> Self {
        Error::Metrics(e.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let Error::RateLimited { retry_after_seconds } = self {
            let body = json!({
                "success": false,
                "error": "Too Many Requests",
                "retryAfterSeconds": retry_after_seconds,
            });
            let mut response = (status, axum::Json(body)).into_response();
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_seconds),
            );
            return response;
        }

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = json!({ "success": false, "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_response_carries_retry_after() {
        let response = Error::RateLimited { retry_after_seconds: 3 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "3");
    }

    #[test]
    fn test_selector_errors_are_bad_requests() {
        let response = Error::InvalidSelector("FOO".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_upstream_errors_map_to_bad_gateway() {
        assert_eq!(Error::Timeout(ExchangeId::Okx).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(Error::Timeout(ExchangeId::Okx).reason(), "timeout");
    }
}
