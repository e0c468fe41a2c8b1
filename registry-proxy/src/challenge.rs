//! Bearer challenges: parsing the upstream's, issuing the proxy's own.

use actix_web::http::header;
use actix_web::HttpResponse;
use commons::ProxyError;
use regex::Regex;
use std::str::FromStr;

/// Service name announced in challenges issued by the proxy.
pub static PROXY_SERVICE: &str = "cloudflare-docker-proxy";

/// Registry API version header, as sent by Docker registries.
pub static API_VERSION_HEADER: &str = "Docker-Distribution-Api-Version";

lazy_static! {
    // A quoted-string value right after `="`, escapes kept verbatim.
    static ref QUOTED_VALUE: Regex = Regex::new(r#"="((?:[^"\\]|\\.)*)""#).unwrap();
}

/// Token endpoint details from a `WWW-Authenticate: Bearer ...` header.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Challenge {
    /// Absolute URL of the token endpoint.
    pub realm: String,
    /// Name of the protected service.
    pub service: String,
}

impl FromStr for Challenge {
    type Err = ProxyError;

    /// Parse a bearer challenge.
    ///
    /// The first two quoted values are taken as realm and service, in this
    /// order. Further attributes (e.g. `scope`) are ignored.
    fn from_str(header: &str) -> Result<Self, Self::Err> {
        let mut values = QUOTED_VALUE
            .captures_iter(header)
            .map(|caps| caps[1].to_string());

        match (values.next(), values.next()) {
            (Some(realm), Some(service)) => Ok(Challenge { realm, service }),
            _ => Err(ProxyError::ChallengeParse(format!(
                "expected quoted realm and service in '{}'",
                header
            ))),
        }
    }
}

/// Parse the value of an upstream `WWW-Authenticate` header.
pub fn parse_authenticate(header: &str) -> Result<Challenge, ProxyError> {
    header.parse()
}

/// Scheme of the proxy's own token realm.
pub fn realm_scheme(debug: bool) -> &'static str {
    if debug {
        "http"
    } else {
        "https"
    }
}

/// Challenge pointing clients at the proxy's `/v2/auth` endpoint on `host`.
pub fn proxy_challenge(scheme: &str, host: &str) -> String {
    format!(
        r#"Bearer realm="{}://{}/v2/auth",service="{}""#,
        scheme,
        escape_quoted(host),
        PROXY_SERVICE
    )
}

/// Escape `"` and `\` for use inside a quoted-string.
fn escape_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Build the 401 response which replaces every upstream 401.
pub fn unauthorized(scheme: &str, host: &str) -> HttpResponse {
    debug!("issuing proxy challenge for host '{}'", host);
    crate::metrics::UNAUTHORIZED_REWRITES.inc();

    HttpResponse::Unauthorized()
        .insert_header((header::WWW_AUTHENTICATE, proxy_challenge(scheme, host)))
        .insert_header((API_VERSION_HEADER, "registry/2.0"))
        .json(serde_json::json!({ "message": "UNAUTHORIZED" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::MessageBody;
    use actix_web::http::StatusCode;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn parse_basic() {
        let challenge = parse_authenticate(
            r#"Bearer realm="https://auth.example.com/token",service="example-registry""#,
        )
        .unwrap();
        assert_eq!(
            challenge,
            Challenge {
                realm: "https://auth.example.com/token".to_string(),
                service: "example-registry".to_string(),
            }
        );
    }

    #[test]
    fn parse_ignores_extra_attributes() {
        let challenge = parse_authenticate(
            r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io",scope="repository:library/busybox:pull""#,
        )
        .unwrap();
        assert_eq!(challenge.realm, "https://auth.docker.io/token");
        assert_eq!(challenge.service, "registry.docker.io");
    }

    #[test]
    fn parse_keeps_escapes() {
        let challenge =
            parse_authenticate(r#"Bearer realm="https://auth.example.com/t\"x",service="svc""#)
                .unwrap();
        assert_eq!(challenge.realm, r#"https://auth.example.com/t\"x"#);
        assert_eq!(challenge.service, "svc");
    }

    #[test_case(r#"Bearer realm="https://auth.example.com/token""#; "missing service")]
    #[test_case(r#"Basic realm=registry"#; "unquoted")]
    #[test_case(""; "empty")]
    fn parse_failures(header: &str) {
        let err = parse_authenticate(header).unwrap_err();
        assert_eq!(err.kind(), "challenge_parse_error");
    }

    #[test]
    fn proxy_challenge_format() {
        assert_eq!(
            proxy_challenge(realm_scheme(false), "docker.example.com"),
            r#"Bearer realm="https://docker.example.com/v2/auth",service="cloudflare-docker-proxy""#
        );
        assert_eq!(
            proxy_challenge(realm_scheme(true), "localhost:8080"),
            r#"Bearer realm="http://localhost:8080/v2/auth",service="cloudflare-docker-proxy""#
        );
    }

    #[test]
    fn proxy_challenge_escapes_host() {
        let challenge = proxy_challenge("https", r#"evil.example.com",service="x"#);
        assert_eq!(
            challenge,
            r#"Bearer realm="https://evil.example.com\",service=\"x/v2/auth",service="cloudflare-docker-proxy""#
        );

        let parsed = parse_authenticate(&challenge).unwrap();
        assert_eq!(
            parsed.realm,
            r#"https://evil.example.com\",service=\"x/v2/auth"#
        );
        assert_eq!(parsed.service, PROXY_SERVICE);
    }

    #[test]
    fn unauthorized_response() {
        let resp = unauthorized("https", "docker.example.com");
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let challenge = resp
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        let parsed = parse_authenticate(challenge).unwrap();
        assert_eq!(parsed.realm, "https://docker.example.com/v2/auth");
        assert_eq!(parsed.service, PROXY_SERVICE);
        assert_eq!(resp.headers().get(API_VERSION_HEADER).unwrap(), "registry/2.0");

        let body = resp.into_body().try_into_bytes().unwrap();
        assert_eq!(body.as_ref(), br#"{"message":"UNAUTHORIZED"}"#);
    }
}
