//! Metrics for the proxy service.

use commons::Fallible;
use prometheus::{histogram_opts, Histogram, IntCounter, Registry};

/// Common prefix for registry-proxy metrics.
pub static METRICS_PREFIX: &str = "registry_proxy";

lazy_static! {
    pub(crate) static ref HTTP_REQS: IntCounter = IntCounter::new(
        "http_requests_total",
        "Total number of HTTP requests handled by the proxy."
    )
    .unwrap();
    pub(crate) static ref HTTP_UPSTREAM_REQS: IntCounter = IntCounter::new(
        "http_upstream_requests_total",
        "Total number of HTTP upstream requests."
    )
    .unwrap();
    pub(crate) static ref HTTP_UPSTREAM_UNREACHABLE: IntCounter = IntCounter::new(
        "http_upstream_errors_total",
        "Total number of HTTP upstream unreachable errors."
    )
    .unwrap();
    pub(crate) static ref AUTH_TOKEN_REQS: IntCounter = IntCounter::new(
        "auth_token_requests_total",
        "Total number of token requests brokered to upstream realms."
    )
    .unwrap();
    pub(crate) static ref AUTH_TOKEN_FAILURES: IntCounter = IntCounter::new(
        "auth_token_failures_total",
        "Total number of non-2xx token responses from upstream realms."
    )
    .unwrap();
    pub(crate) static ref UNAUTHORIZED_REWRITES: IntCounter = IntCounter::new(
        "unauthorized_rewrites_total",
        "Total number of upstream 401 responses replaced by a proxy challenge."
    )
    .unwrap();
    pub(crate) static ref LIBRARY_REDIRECTS: IntCounter = IntCounter::new(
        "library_redirects_total",
        "Total number of redirects to the implicit Docker Hub library namespace."
    )
    .unwrap();
    pub(crate) static ref BLOB_REDIRECTS: IntCounter = IntCounter::new(
        "blob_redirects_followed_total",
        "Total number of Docker Hub blob redirects followed by the proxy."
    )
    .unwrap();
    pub(crate) static ref HTTP_SERVE_HIST: Histogram = Histogram::with_opts(histogram_opts!(
        "http_serve_duration_seconds",
        "HTTP proxy serving latency in seconds.",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ))
    .unwrap();
}

/// Register relevant metrics to a prometheus registry.
pub fn register_metrics(registry: &Registry) -> Fallible<()> {
    commons::register_metrics(registry)?;
    registry.register(Box::new(HTTP_REQS.clone()))?;
    registry.register(Box::new(HTTP_UPSTREAM_REQS.clone()))?;
    registry.register(Box::new(HTTP_UPSTREAM_UNREACHABLE.clone()))?;
    registry.register(Box::new(AUTH_TOKEN_REQS.clone()))?;
    registry.register(Box::new(AUTH_TOKEN_FAILURES.clone()))?;
    registry.register(Box::new(UNAUTHORIZED_REWRITES.clone()))?;
    registry.register(Box::new(LIBRARY_REDIRECTS.clone()))?;
    registry.register(Box::new(BLOB_REDIRECTS.clone()))?;
    registry.register(Box::new(HTTP_SERVE_HIST.clone()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use commons::metrics::new_registry;

    #[test]
    fn register_all_metrics() -> Fallible<()> {
        let registry = new_registry(Some(METRICS_PREFIX.to_string()))?;
        register_metrics(&registry)?;

        HTTP_REQS.inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"registry_proxy_http_requests_total".to_string()));
        assert!(names.contains(&"registry_proxy_http_serve_duration_seconds".to_string()));

        // Registering twice on the same registry must fail.
        register_metrics(&registry).unwrap_err();
        Ok(())
    }
}
