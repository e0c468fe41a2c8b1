//! Common utilities for the registry proxy backend.

#![deny(missing_docs)]

#[macro_use]
extern crate lazy_static;

mod config;
pub use crate::config::MergeOptions;

pub mod de;
pub mod metrics;
pub mod testing;

mod errors;
pub use errors::{register_metrics, Fallible, ProxyError};

/// Commonly used imports for error handling.
pub mod prelude_errors {
    pub use crate::errors::prelude::*;
}

use prelude_errors::*;
use url::Url;

/// Parse and normalize the base URL of an upstream registry.
///
/// Only absolute `http` and `https` URLs without query or fragment are
/// accepted. The result carries no trailing slash, so that API paths can be
/// appended verbatim.
pub fn parse_base_url<S>(input: S) -> Fallible<String>
where
    S: AsRef<str>,
{
    let input = input.as_ref().trim();
    let url = Url::parse(input).context(format!("invalid upstream URL '{}'", input))?;
    ensure!(
        url.scheme() == "http" || url.scheme() == "https",
        "unsupported scheme '{}' in upstream URL '{}'",
        url.scheme(),
        input
    );
    ensure!(url.has_host(), "missing host in upstream URL '{}'", input);
    ensure!(
        url.query().is_none() && url.fragment().is_none(),
        "unexpected query or fragment in upstream URL '{}'",
        input
    );

    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Parse a `<hostname>=<upstream URL>` route definition.
pub fn parse_route<S>(input: S) -> Fallible<(String, String)>
where
    S: AsRef<str>,
{
    let input = input.as_ref();
    let (host, upstream) = match input.split_once('=') {
        Some(pair) => pair,
        None => bail!("route '{}' is not in the form <host>=<url>", input),
    };

    let host = host.trim();
    ensure!(!host.is_empty(), "empty hostname in route '{}'", input);

    Ok((host.to_string(), parse_base_url(upstream)?))
}
