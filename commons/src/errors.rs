//! Error types shared by the proxy services.

use actix_web::http::{header, StatusCode};
use actix_web::HttpResponse;
use prometheus::{IntCounterVec, Opts, Registry};
use thiserror::Error;

/// Result type for plumbing code (configuration, startup, helpers).
pub type Fallible<T> = Result<T, anyhow::Error>;

/// Commonly used imports for error handling.
pub mod prelude {
    pub use super::Fallible;
    pub use anyhow::{bail, ensure, format_err, Context, Error};
}

lazy_static! {
    static ref RESPONSE_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "response_errors_total",
            "Total number of error responses, by kind."
        ),
        &["kind"]
    )
    .unwrap();
}

/// Register error metrics to a prometheus registry.
pub fn register_metrics(registry: &Registry) -> Fallible<()> {
    registry.register(Box::new(RESPONSE_ERRORS.clone()))?;
    Ok(())
}

/// Failures which terminate a proxied request locally.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ProxyError {
    /// No upstream is configured for the request host.
    #[error("no registry configured for host '{host}', known hosts: [{}]", .known.join(", "))]
    RouteNotFound {
        /// Request host, as received.
        host: String,
        /// Hostnames present in the route table.
        known: Vec<String>,
    },
    /// The upstream `WWW-Authenticate` challenge could not be parsed.
    #[error("failed to parse authentication challenge: {0}")]
    ChallengeParse(String),
    /// A network failure while contacting an upstream.
    #[error("failed to contact upstream registry: {0}")]
    UpstreamUnreachable(String),
    /// An outbound request could not be assembled.
    #[error("failed to assemble upstream request: {0}")]
    InvalidUpstreamRequest(String),
    /// Path outside of the registry API.
    #[error("{0}")]
    NotFound(String),
}

impl actix_web::error::ResponseError for ProxyError {
    fn status_code(&self) -> StatusCode {
        match *self {
            ProxyError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            ProxyError::ChallengeParse(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            ProxyError::InvalidUpstreamRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        self.as_json_error()
    }
}

impl ProxyError {
    /// Return the HTTP JSON error response.
    pub fn as_json_error(&self) -> HttpResponse {
        use actix_web::error::ResponseError;

        RESPONSE_ERRORS.with_label_values(&[self.kind()]).inc();
        let json_body = serde_json::json!({
            "kind": self.kind(),
            "value": self.to_string(),
        });
        HttpResponse::build(self.status_code())
            .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
            .json(json_body)
    }

    /// Return the kind for the error.
    pub fn kind(&self) -> &'static str {
        match *self {
            ProxyError::RouteNotFound { .. } => "route_not_found",
            ProxyError::ChallengeParse(_) => "challenge_parse_error",
            ProxyError::UpstreamUnreachable(_) => "upstream_unreachable",
            ProxyError::InvalidUpstreamRequest(_) => "invalid_upstream_request",
            ProxyError::NotFound(_) => "not_found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::MessageBody;

    #[test]
    fn route_not_found_lists_hosts() {
        let err = ProxyError::RouteNotFound {
            host: "unknown.example.com".to_string(),
            known: vec!["docker.example.com".to_string(), "quay.example.com".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "no registry configured for host 'unknown.example.com', known hosts: [docker.example.com, quay.example.com]"
        );

        let resp = err.as_json_error();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body = resp.into_body().try_into_bytes().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["kind"], "route_not_found");
        assert!(json["value"]
            .as_str()
            .unwrap()
            .contains("quay.example.com"));
    }

    #[test]
    fn upstream_errors_are_bad_gateway() {
        use actix_web::error::ResponseError;

        let unreachable = ProxyError::UpstreamUnreachable("connection refused".to_string());
        assert_eq!(unreachable.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(unreachable.kind(), "upstream_unreachable");

        let challenge = ProxyError::ChallengeParse("Basic".to_string());
        assert_eq!(challenge.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(challenge.kind(), "challenge_parse_error");
    }
}
