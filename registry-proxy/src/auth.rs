//! Token brokering for the proxy's `/v2/auth` endpoint.

use crate::challenge::{parse_authenticate, Challenge};
use crate::dockerhub::normalize_scope;
use crate::forward::{self, UpstreamClients};
use crate::metrics::{AUTH_TOKEN_FAILURES, AUTH_TOKEN_REQS};
use crate::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use commons::ProxyError;
use reqwest::header::{HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use url::Url;

/// Serve token requests, on behalf of the routed upstream.
pub async fn token(
    req: HttpRequest,
    app_data: web::Data<AppState>,
) -> Result<HttpResponse, ProxyError> {
    let target = crate::service::resolve(&req, &app_data)?;

    // Anonymous probe, to discover the upstream token realm.
    let probe = forward::probe(app_data.clients(), &target.upstream, None).await?;
    if probe.status() != StatusCode::UNAUTHORIZED {
        trace!("upstream {} requires no token", target.upstream.url);
        return Ok(forward::relay(probe));
    }
    let challenge = match probe.headers().get(WWW_AUTHENTICATE) {
        Some(value) => value
            .to_str()
            .map_err(|e| ProxyError::ChallengeParse(e.to_string()))
            .and_then(parse_authenticate)?,
        None => return Ok(forward::relay(probe)),
    };

    let scopes: Vec<String> = query_scopes(req.query_string())
        .iter()
        .map(|scope| normalize_scope(scope, target.upstream.docker_hub))
        .collect();
    let res = exchange(
        app_data.clients(),
        &challenge,
        &scopes,
        forward::authorization(&req),
    )
    .await?;

    if !res.status().is_success() {
        AUTH_TOKEN_FAILURES.inc();
        warn!(
            "token request to {} failed with status {}",
            challenge.realm,
            res.status()
        );
    }
    Ok(forward::relay(res))
}

/// Request a token from the realm of `challenge`.
///
/// Caller credentials, if any, are passed along unchanged.
pub async fn exchange(
    clients: &UpstreamClients,
    challenge: &Challenge,
    scopes: &[String],
    authorization: Option<HeaderValue>,
) -> Result<reqwest::Response, ProxyError> {
    let url = token_url(challenge, scopes)?;
    debug!("requesting token from {}", url);
    AUTH_TOKEN_REQS.inc();

    let mut builder = clients.follow().get(url);
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    forward::send(builder).await
}

/// Token endpoint URL, with `service` and one `scope` query parameter per
/// requested scope.
pub fn token_url(challenge: &Challenge, scopes: &[String]) -> Result<Url, ProxyError> {
    let mut url = Url::parse(&challenge.realm).map_err(|e| {
        ProxyError::InvalidUpstreamRequest(format!("invalid realm '{}': {}", challenge.realm, e))
    })?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("service", &challenge.service);
        for scope in scopes {
            query.append_pair("scope", scope);
        }
    }
    Ok(url)
}

fn query_scopes(query: &str) -> Vec<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == "scope")
        .map(|(_, value)| value.into_owned())
        .collect()
}
