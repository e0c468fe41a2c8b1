//! Host-based routing to upstream registries.

use commons::ProxyError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An upstream registry, as resolved for a single request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Upstream {
    /// Base URL, without trailing slash.
    pub url: String,
    /// Whether Docker Hub specific rewrites apply.
    pub docker_hub: bool,
}

/// Immutable route table, from hostname to upstream base URL.
#[derive(Clone, Debug)]
pub struct Router {
    routes: Arc<BTreeMap<String, String>>,
    fallback: Option<String>,
    docker_hub: String,
}

impl Router {
    /// Build a router.
    ///
    /// `fallback` is only consulted for hosts missing from `routes`, and
    /// should only be set in debug mode.
    pub fn new(
        routes: BTreeMap<String, String>,
        fallback: Option<String>,
        docker_hub: String,
    ) -> Self {
        Self {
            routes: Arc::new(routes),
            fallback,
            docker_hub,
        }
    }

    /// Exact-match lookup of the upstream base URL for `host`.
    pub fn lookup(&self, host: &str) -> Option<&str> {
        self.routes
            .get(host)
            .or_else(|| self.fallback.as_ref())
            .map(String::as_str)
    }

    /// Resolve the upstream for a request host (with or without port).
    pub fn resolve(&self, host: &str) -> Result<Upstream, ProxyError> {
        let url = match self.lookup(strip_port(host)) {
            Some(url) => url.to_string(),
            None => {
                return Err(ProxyError::RouteNotFound {
                    host: host.to_string(),
                    known: self.hostnames(),
                })
            }
        };
        trace!("routing host '{}' to upstream {}", host, url);

        Ok(Upstream {
            docker_hub: url == self.docker_hub,
            url,
        })
    }

    /// Configured hostnames, sorted.
    pub fn hostnames(&self) -> Vec<String> {
        self.routes.keys().cloned().collect()
    }
}

/// Strip an optional `:port` suffix from a host header value.
pub fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literal, e.g. `[::1]:8080`.
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }

    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}
