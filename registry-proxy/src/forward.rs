//! Forwarding of registry requests to upstreams.

use crate::metrics::{BLOB_REDIRECTS, HTTP_UPSTREAM_REQS, HTTP_UPSTREAM_UNREACHABLE};
use crate::router::Upstream;
use actix_web::http::{header as actix_header, StatusCode};
use actix_web::web::Bytes;
use actix_web::{HttpRequest, HttpResponse, HttpResponseBuilder};
use commons::prelude_errors::*;
use commons::ProxyError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, LOCATION};
use reqwest::redirect;
use std::time::Duration;

/// Inbound headers which are never forwarded upstream.
static SKIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "cf-connecting-ip",
    "cf-ipcountry",
    "cf-ray",
    "cf-visitor",
    "x-forwarded-for",
    "x-forwarded-host",
    "x-forwarded-proto",
    "x-real-ip",
];

/// Upstream headers which are never relayed to clients.
static SKIPPED_RESPONSE_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// HTTP clients for upstream requests.
#[derive(Clone, Debug)]
pub struct UpstreamClients {
    follow: reqwest::Client,
    manual: reqwest::Client,
}

impl UpstreamClients {
    /// Build clients sharing the same deadline and default User-Agent.
    pub fn try_new(timeout: Duration, user_agent: &str) -> Fallible<Self> {
        let build = |policy: redirect::Policy| {
            reqwest::ClientBuilder::new()
                .redirect(policy)
                .timeout(timeout)
                .user_agent(user_agent)
                .build()
        };

        Ok(Self {
            follow: build(redirect::Policy::default()).context("building reqwest client")?,
            manual: build(redirect::Policy::none())
                .context("building non-redirecting reqwest client")?,
        })
    }

    /// Client which follows redirects on its own.
    pub fn follow(&self) -> &reqwest::Client {
        &self.follow
    }

    /// Client for requests forwarded to `upstream`.
    ///
    /// Docker Hub redirects are not followed automatically, see
    /// `follow_blob_redirect`.
    pub fn for_upstream(&self, upstream: &Upstream) -> &reqwest::Client {
        if upstream.docker_hub {
            &self.manual
        } else {
            &self.follow
        }
    }
}

/// Copy inbound headers for an upstream request, minus hop-by-hop and
/// infrastructure ones.
pub fn request_headers(req: &HttpRequest) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in req.headers().iter() {
        if SKIPPED_REQUEST_HEADERS.contains(&name.as_str()) {
            continue;
        }
        let name = HeaderName::from_bytes(name.as_str().as_bytes());
        let value = HeaderValue::from_bytes(value.as_bytes());
        if let (Ok(name), Ok(value)) = (name, value) {
            headers.append(name, value);
        }
    }
    headers
}

/// The caller's `Authorization` header, if any.
pub fn authorization(req: &HttpRequest) -> Option<HeaderValue> {
    req.headers()
        .get(actix_header::AUTHORIZATION)
        .and_then(|value| HeaderValue::from_bytes(value.as_bytes()).ok())
}

/// Send an upstream request, accounting for network failures.
pub async fn send(builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ProxyError> {
    HTTP_UPSTREAM_REQS.inc();
    builder.send().await.map_err(|e| {
        HTTP_UPSTREAM_UNREACHABLE.inc();
        error!("error contacting upstream: {}", e);
        ProxyError::UpstreamUnreachable(e.to_string())
    })
}

/// GET the `/v2/` endpoint of `upstream`, following redirects.
pub async fn probe(
    clients: &UpstreamClients,
    upstream: &Upstream,
    authorization: Option<HeaderValue>,
) -> Result<reqwest::Response, ProxyError> {
    let mut builder = clients.follow().get(format!("{}/v2/", upstream.url));
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    send(builder).await
}

/// Forward an inbound registry request to `upstream`.
///
/// Docker Hub blob redirects are resolved with a second request, so the
/// returned response is the final one.
pub async fn forward(
    req: &HttpRequest,
    body: Bytes,
    upstream: &Upstream,
    clients: &UpstreamClients,
) -> Result<reqwest::Response, ProxyError> {
    let url = match req.uri().query() {
        Some(query) => format!("{}{}?{}", upstream.url, req.uri().path(), query),
        None => format!("{}{}", upstream.url, req.uri().path()),
    };
    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
        .map_err(|e| ProxyError::InvalidUpstreamRequest(e.to_string()))?;
    trace!("forwarding {} {}", method, url);

    let mut builder = clients
        .for_upstream(upstream)
        .request(method.clone(), &url)
        .headers(request_headers(req));
    if method != reqwest::Method::GET && method != reqwest::Method::HEAD {
        builder = builder.body(body);
    }

    let res = send(builder).await?;
    if upstream.docker_hub && res.status() == reqwest::StatusCode::TEMPORARY_REDIRECT {
        return follow_blob_redirect(res, clients).await;
    }

    Ok(res)
}

/// Fetch the target of a Docker Hub blob redirect as a fresh request.
///
/// The target is a pre-signed CDN URL, so the request carries none of the
/// caller's headers (in particular no `Authorization`).
pub async fn follow_blob_redirect(
    res: reqwest::Response,
    clients: &UpstreamClients,
) -> Result<reqwest::Response, ProxyError> {
    let location = res
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let location = match location {
        Some(location) => location,
        None => {
            warn!("redirect from {} without a usable Location", res.url());
            return Ok(res);
        }
    };

    let target = res.url().join(&location).map_err(|e| {
        ProxyError::InvalidUpstreamRequest(format!(
            "invalid redirect location '{}': {}",
            location, e
        ))
    })?;
    debug!(
        "following blob redirect to {}",
        target.host_str().unwrap_or("<no host>")
    );
    BLOB_REDIRECTS.inc();

    send(clients.follow().get(target)).await
}

/// Stream an upstream response back to the client, as-is.
pub fn relay(res: reqwest::Response) -> HttpResponse {
    let status = StatusCode::from_u16(res.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = HttpResponse::build(status);
    copy_response_headers(res.headers(), &mut builder);

    let length = res
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Some(length) = length {
        builder.no_chunking(length);
    }

    builder.streaming(res.bytes_stream())
}

fn copy_response_headers(headers: &HeaderMap, builder: &mut HttpResponseBuilder) {
    for (name, value) in headers.iter() {
        if SKIPPED_RESPONSE_HEADERS.contains(&name.as_str()) {
            continue;
        }
        let name = actix_header::HeaderName::from_bytes(name.as_str().as_bytes());
        let value = actix_header::HeaderValue::from_bytes(value.as_bytes());
        if let (Ok(name), Ok(value)) = (name, value) {
            builder.append_header((name, value));
        }
    }
}
