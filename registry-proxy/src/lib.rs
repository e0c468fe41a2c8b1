//! Docker Registry v2 reverse proxy.
//!
//! Requests are routed by host to an upstream registry. Upstream bearer
//! challenges are replaced by challenges pointing at the proxy's own
//! `/v2/auth` endpoint, which brokers token requests to the real realm.

#![deny(missing_docs)]

#[macro_use]
extern crate commons;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate smart_default;
#[macro_use]
extern crate structopt;

pub mod auth;
pub mod challenge;
pub mod config;
pub mod dockerhub;
pub mod forward;
pub mod metrics;
pub mod router;
pub mod service;
pub mod status;

use commons::metrics::HasRegistry;
use commons::prelude_errors::*;
use custom_debug_derive::Debug as CustomDebug;
use forward::UpstreamClients;
use parking_lot::RwLock;
use prometheus::Registry;
use router::Router;
use std::sync::Arc;

/// Shared application state (cloned per-thread).
#[derive(Clone, CustomDebug)]
pub struct AppState {
    router: Router,
    #[debug(skip)]
    clients: UpstreamClients,
    debug: bool,
    live: Arc<RwLock<bool>>,
    ready: Arc<RwLock<bool>>,
    #[debug(skip)]
    registry: &'static Registry,
}

impl AppState {
    /// Build the state for validated settings.
    pub fn try_new(settings: &config::AppSettings, registry: &'static Registry) -> Fallible<Self> {
        let fallback = if settings.debug {
            Some(settings.default_upstream.clone())
        } else {
            None
        };
        let router = Router::new(
            settings.routes.clone(),
            fallback,
            settings.docker_hub.clone(),
        );
        let clients = UpstreamClients::try_new(settings.upstream_timeout, &settings.user_agent)?;

        Ok(Self {
            router,
            clients,
            debug: settings.debug,
            live: Arc::new(RwLock::new(false)),
            ready: Arc::new(RwLock::new(false)),
            registry,
        })
    }

    /// Host-based router.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// HTTP clients for upstream requests.
    pub fn clients(&self) -> &UpstreamClients {
        &self.clients
    }

    /// Scheme of the token realm announced to clients.
    pub fn realm_scheme(&self) -> &'static str {
        challenge::realm_scheme(self.debug)
    }

    /// Returns the boolean inside self.live
    pub fn is_live(&self) -> bool {
        *self.live.read()
    }

    /// Returns the boolean inside self.ready
    pub fn is_ready(&self) -> bool {
        *self.ready.read()
    }

    /// Flag the application as live.
    pub fn set_live(&self, live: bool) {
        *self.live.write() = live;
    }

    /// Flag the application as ready.
    pub fn set_ready(&self, ready: bool) {
        *self.ready.write() = ready;
    }
}

impl HasRegistry for AppState {
    fn registry(&self) -> &'static Registry {
        self.registry
    }
}
