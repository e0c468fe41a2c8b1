//! Metrics service.

use actix_web::{web, HttpResponse};
use prometheus::{self, Registry};

use crate::Fallible;

/// For types that store a static Registry reference
pub trait HasRegistry {
    /// Get the static registry reference
    fn registry(&self) -> &'static Registry;
}

/// Minimally wraps a Registry for implementing `HasRegistry`.
pub struct RegistryWrapper(pub &'static Registry);

impl HasRegistry for RegistryWrapper {
    fn registry(&self) -> &'static Registry {
        self.0
    }
}

/// Serve metrics requests (Prometheus textual format).
pub async fn serve<T>(app_data: web::Data<T>) -> HttpResponse
where
    T: 'static + HasRegistry,
{
    use prometheus::Encoder;

    let metrics = app_data.registry().gather();
    let tenc = prometheus::TextEncoder::new();
    let mut buf = vec![];
    match tenc.encode(&metrics, &mut buf) {
        Ok(_) => HttpResponse::Ok()
            .content_type(tenc.format_type())
            .body(buf),
        Err(e) => {
            log::error!("failed to encode metrics: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Create a custom Prometheus registry.
pub fn new_registry(prefix: Option<String>) -> Fallible<Registry> {
    Registry::new_custom(prefix.clone(), None).map_err(|e| {
        anyhow::format_err!(
            "could not create a custom registry with prefix {:?}: {}",
            prefix,
            e
        )
    })
}
