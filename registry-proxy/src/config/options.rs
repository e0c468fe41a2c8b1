//! Options shared by CLI and TOML.

use super::AppSettings;
use commons::de::de_duration_secs;
use commons::prelude_errors::*;
use commons::MergeOptions;
use std::net::IpAddr;
use std::time::Duration;

/// Status service options.
#[derive(Debug, Deserialize, Serialize, StructOpt)]
pub struct StatusOptions {
    /// Address on which the status service will listen
    #[structopt(name = "status_address", long = "status.address")]
    pub address: Option<IpAddr>,

    /// Port to which the status service will bind
    #[structopt(name = "status_port", long = "status.port")]
    pub port: Option<u16>,
}

impl MergeOptions<Option<StatusOptions>> for AppSettings {
    fn try_merge(&mut self, opts: Option<StatusOptions>) -> Fallible<()> {
        if let Some(status) = opts {
            assign_if_some!(self.status_address, status.address);
            assign_if_some!(self.status_port, status.port);
        }
        Ok(())
    }
}

/// Options for the main proxy service.
#[derive(Debug, Deserialize, Serialize, StructOpt)]
pub struct ServiceOptions {
    /// Address on which the server will listen
    #[structopt(name = "service_address", long = "service.address")]
    pub address: Option<IpAddr>,

    /// Port to which the server will bind
    #[structopt(name = "service_port", long = "service.port")]
    pub port: Option<u16>,

    /// Debug mode: plain-http auth realm and fallback to the default upstream
    #[structopt(name = "service_debug", long = "service.debug")]
    pub debug: Option<bool>,

    /// Timeout (in seconds) for receiving the first inbound request
    #[structopt(name = "client_timeout", long = "service.client_timeout")]
    pub client_timeout: Option<u64>,
}

impl MergeOptions<Option<ServiceOptions>> for AppSettings {
    fn try_merge(&mut self, opts: Option<ServiceOptions>) -> Fallible<()> {
        if let Some(service) = opts {
            assign_if_some!(self.address, service.address);
            assign_if_some!(self.port, service.port);
            assign_if_some!(self.debug, service.debug);
            if let Some(secs) = service.client_timeout {
                self.client_timeout = Duration::from_secs(secs);
            }
        }
        Ok(())
    }
}

/// Options for outbound requests to upstream registries.
#[derive(Debug, Deserialize, StructOpt)]
pub struct UpstreamOptions {
    /// Upstream used for unmatched hosts, in debug mode only
    #[structopt(name = "upstream_default", long = "upstream.default")]
    pub default: Option<String>,

    /// Base URL which is handled as Docker Hub
    #[structopt(name = "upstream_docker_hub", long = "upstream.docker_hub")]
    pub docker_hub: Option<String>,

    /// Deadline (in seconds) for each outbound request
    #[structopt(
        name = "upstream_timeout",
        long = "upstream.timeout",
        parse(try_from_str = duration_from_secs)
    )]
    #[serde(default = "Option::default", deserialize_with = "de_duration_secs")]
    pub timeout: Option<Duration>,

    /// User-Agent for outbound requests without one
    #[structopt(name = "upstream_user_agent", long = "upstream.user_agent")]
    pub user_agent: Option<String>,
}

impl MergeOptions<Option<UpstreamOptions>> for AppSettings {
    fn try_merge(&mut self, opts: Option<UpstreamOptions>) -> Fallible<()> {
        if let Some(upstream) = opts {
            assign_if_some!(self.default_upstream, upstream.default);
            assign_if_some!(self.docker_hub, upstream.docker_hub);
            assign_if_some!(self.upstream_timeout, upstream.timeout);
            assign_if_some!(self.user_agent, upstream.user_agent);
        }
        Ok(())
    }
}

/// Parse a duration from a number of seconds.
pub fn duration_from_secs<S>(input: S) -> Fallible<Duration>
where
    S: AsRef<str>,
{
    let secs: u64 = input
        .as_ref()
        .parse()
        .context(format!("invalid number of seconds '{}'", input.as_ref()))?;
    Ok(Duration::from_secs(secs))
}
