//! Application settings for registry-proxy.

use super::{cli, file};
use commons::parse_base_url;
use commons::prelude_errors::*;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use structopt::StructOpt;

/// Base URL of the Docker Hub registry API.
pub static DOCKER_HUB_URL: &str = "https://registry-1.docker.io";

/// Default deadline for outbound requests, in seconds.
pub static DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent for outbound requests.
pub static DEFAULT_USER_AGENT: &str = concat!("registry-proxy/", env!("CARGO_PKG_VERSION"));

/// Runtime application settings (validated config).
#[derive(Debug, SmartDefault)]
pub struct AppSettings {
    /// Global log level.
    #[default(log::LevelFilter::Warn)]
    pub verbosity: log::LevelFilter,

    /// Listening address for the main service.
    #[default(IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub address: IpAddr,

    /// Listening port for the main service.
    #[default(8080)]
    pub port: u16,

    /// Listening address for the status service.
    #[default(IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub status_address: IpAddr,

    /// Listening port for the status service.
    #[default(9080)]
    pub status_port: u16,

    /// Debug mode (plain-http realm, fallback upstream).
    pub debug: bool,

    /// Actix-web server client timeout for first request.
    #[default(Duration::new(5, 0))]
    pub client_timeout: Duration,

    /// Route table, from hostname to upstream base URL.
    pub routes: BTreeMap<String, String>,

    /// Upstream for unmatched hosts, used in debug mode only.
    #[default(DOCKER_HUB_URL.to_string())]
    pub default_upstream: String,

    /// Upstream base URL which gets Docker Hub specific handling.
    #[default(DOCKER_HUB_URL.to_string())]
    pub docker_hub: String,

    /// Deadline for each outbound request.
    #[default(Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS))]
    pub upstream_timeout: Duration,

    /// User-Agent for outbound requests which carry none.
    #[default(DEFAULT_USER_AGENT.to_string())]
    pub user_agent: String,
}

impl AppSettings {
    /// Lookup all optional configs, merge them with defaults, and
    /// transform into valid runtime settings.
    pub fn assemble() -> Fallible<Self> {
        use commons::MergeOptions;

        let defaults = Self::default();

        // Source options.
        let cli_opts = cli::CliOptions::from_args();
        let file_opts = match &cli_opts.config_path {
            Some(ref path) => Some(file::FileOptions::read_filepath(path)?),
            None => None,
        };

        // Combine options into a single config, CLI flags last.
        let mut cfg = defaults;
        cfg.try_merge(file_opts)?;
        cfg.try_merge(cli_opts)?;

        // Validate and convert to settings.
        Self::try_validate(cfg)
    }

    /// Validate and build runtime settings.
    pub(crate) fn try_validate(self) -> Fallible<Self> {
        let mut cfg = self;

        if cfg.address == cfg.status_address && cfg.port == cfg.status_port {
            bail!("main and status service configured with the same address and port");
        }

        if cfg.routes.is_empty() && !cfg.debug {
            bail!("no routes configured, and debug mode is disabled");
        }

        ensure!(
            cfg.upstream_timeout > Duration::from_secs(0),
            "unexpected 0s upstream timeout"
        );

        let mut routes = BTreeMap::new();
        for (host, upstream) in cfg.routes {
            ensure!(!host.trim().is_empty(), "empty hostname in route table");
            let upstream =
                parse_base_url(&upstream).context(format!("invalid route for host '{}'", host))?;
            routes.insert(host, upstream);
        }
        cfg.routes = routes;

        cfg.default_upstream =
            parse_base_url(&cfg.default_upstream).context("invalid default upstream")?;
        cfg.docker_hub = parse_base_url(&cfg.docker_hub).context("invalid Docker Hub upstream")?;

        Ok(cfg)
    }
}
