//! Main service: request classification and the registry API handlers.

use crate::challenge;
use crate::dockerhub::library_path;
use crate::forward;
use crate::metrics::{HTTP_REQS, HTTP_SERVE_HIST, LIBRARY_REDIRECTS};
use crate::router::Upstream;
use crate::AppState;
use actix_web::dev::Service;
use actix_web::http::header;
use actix_web::{guard, middleware, web, HttpRequest, HttpResponse};
use commons::ProxyError;
use futures::FutureExt;

/// Methods announced in CORS preflight responses.
pub static CORS_ALLOW_METHODS: &str = "GET, HEAD, POST, PUT, DELETE, OPTIONS";

/// Request headers announced in CORS preflight responses.
pub static CORS_ALLOW_HEADERS: &str = "Authorization, Content-Type, Docker-Content-Digest";

/// Lifetime of CORS preflight responses, in seconds.
pub static CORS_MAX_AGE: &str = "86400";

/// Message for paths outside of the registry API.
pub static NOT_REGISTRY_API: &str = "Docker Registry API v2 only";

/// Register the main service routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            .wrap(
                middleware::DefaultHeaders::new()
                    .add((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")),
            )
            .wrap_fn(|req, srv| {
                HTTP_REQS.inc();
                let timer = HTTP_SERVE_HIST.start_timer();
                srv.call(req).map(move |res| {
                    timer.observe_duration();
                    res
                })
            })
            .service(
                web::resource("/{tail:.*}")
                    .guard(guard::Options())
                    .to(preflight),
            )
            .service(web::resource("/").to(index))
            .service(web::resource("/v2/").to(root_probe))
            .service(web::resource("/v2/auth").to(crate::auth::token))
            .service(web::resource("/v2/{path:.*}").to(registry))
            .default_service(web::to(not_found)),
    );
}

/// Request host and the upstream it is routed to.
#[derive(Debug)]
pub(crate) struct Target {
    /// Host as received, port included.
    pub(crate) host: String,
    pub(crate) upstream: Upstream,
}

/// Route a request by its host.
pub(crate) fn resolve(req: &HttpRequest, app_data: &AppState) -> Result<Target, ProxyError> {
    let host = request_host(req);
    let upstream = app_data.router().resolve(&host).map_err(|e| {
        debug!("rejecting request for {}: {}", req.path(), e);
        e
    })?;

    Ok(Target { host, upstream })
}

/// Host as sent by the client, from the `Host` header or the request target.
///
/// Forwarding headers (`Forwarded`, `X-Forwarded-Host`) are ignored.
pub(crate) fn request_host(req: &HttpRequest) -> String {
    req.headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().authority().map(|authority| authority.to_string()))
        .unwrap_or_default()
}

/// Answer CORS preflight requests locally.
async fn preflight() -> HttpResponse {
    HttpResponse::NoContent()
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, CORS_ALLOW_METHODS))
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, CORS_ALLOW_HEADERS))
        .insert_header((header::ACCESS_CONTROL_MAX_AGE, CORS_MAX_AGE))
        .finish()
}

async fn index(
    req: HttpRequest,
    app_data: web::Data<AppState>,
) -> Result<HttpResponse, ProxyError> {
    resolve(&req, &app_data)?;
    Ok(HttpResponse::MovedPermanently()
        .insert_header((header::LOCATION, "/v2/"))
        .finish())
}

/// Registry API version check, with the upstream challenge replaced.
async fn root_probe(
    req: HttpRequest,
    app_data: web::Data<AppState>,
) -> Result<HttpResponse, ProxyError> {
    let target = resolve(&req, &app_data)?;
    let res = forward::probe(
        app_data.clients(),
        &target.upstream,
        forward::authorization(&req),
    )
    .await?;

    if res.status() == reqwest::StatusCode::UNAUTHORIZED {
        return Ok(challenge::unauthorized(app_data.realm_scheme(), &target.host));
    }
    Ok(forward::relay(res))
}

/// Proxy a registry API request.
async fn registry(
    req: HttpRequest,
    body: web::Bytes,
    app_data: web::Data<AppState>,
) -> Result<HttpResponse, ProxyError> {
    let target = resolve(&req, &app_data)?;

    if target.upstream.docker_hub {
        if let Some(path) = library_path(req.path()) {
            let location = match req.uri().query() {
                Some(query) => format!("{}?{}", path, query),
                None => path,
            };
            debug!("redirecting {} to {}", req.path(), location);
            LIBRARY_REDIRECTS.inc();
            return Ok(HttpResponse::MovedPermanently()
                .insert_header((header::LOCATION, location))
                .finish());
        }
    }

    let res = forward::forward(&req, body, &target.upstream, app_data.clients()).await?;
    if res.status() == reqwest::StatusCode::UNAUTHORIZED {
        return Ok(challenge::unauthorized(app_data.realm_scheme(), &target.host));
    }
    Ok(forward::relay(res))
}

async fn not_found(
    req: HttpRequest,
    app_data: web::Data<AppState>,
) -> Result<HttpResponse, ProxyError> {
    resolve(&req, &app_data)?;
    Err(ProxyError::NotFound(NOT_REGISTRY_API.to_string()))
}
