//! TOML file configuration options.

use super::options;
use super::AppSettings;
use commons::de::de_loglevel;
use commons::prelude_errors::*;
use commons::MergeOptions;
use std::collections::BTreeMap;
use std::{fs, path};

/// TOML configuration, top-level.
#[derive(Debug, Deserialize)]
pub struct FileOptions {
    /// Verbosity level.
    #[serde(default = "Option::default", deserialize_with = "de_loglevel")]
    pub verbosity: Option<log::LevelFilter>,

    /// Web frontend options.
    pub service: Option<options::ServiceOptions>,

    /// Status service options.
    pub status: Option<options::StatusOptions>,

    /// Upstream options.
    pub upstream: Option<options::UpstreamOptions>,

    /// Route table, from hostname to upstream base URL.
    pub routes: Option<BTreeMap<String, String>>,
}

impl FileOptions {
    /// Parse a TOML configuration from path.
    pub fn read_filepath<P>(cfg_path: P) -> Fallible<Self>
    where
        P: AsRef<path::Path>,
    {
        let content = fs::read_to_string(&cfg_path).context(format!(
            "failed to read config path {:?}",
            cfg_path.as_ref()
        ))?;
        let cfg = toml::from_str(&content).context(format!(
            "failed to parse config file {}:\n{}",
            cfg_path.as_ref().display(),
            content
        ))?;

        Ok(cfg)
    }
}

impl MergeOptions<Option<FileOptions>> for AppSettings {
    fn try_merge(&mut self, opts: Option<FileOptions>) -> Fallible<()> {
        if let Some(file) = opts {
            assign_if_some!(self.verbosity, file.verbosity);
            if let Some(routes) = file.routes {
                self.routes.extend(routes);
            }
            self.try_merge(file.service)?;
            self.try_merge(file.status)?;
            self.try_merge(file.upstream)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::FileOptions;
    use crate::config::AppSettings;
    use commons::MergeOptions;
    use std::time::Duration;

    #[test]
    fn toml_merge_settings() {
        let mut settings = AppSettings::default();
        assert_eq!(settings.status_port, 9080);
        assert!(!settings.debug);

        let toml_input = "status.port = 2222\nservice.debug = true";
        let file_opts: FileOptions = toml::from_str(toml_input).unwrap();

        settings.try_merge(Some(file_opts)).unwrap();
        assert_eq!(settings.status_port, 2222);
        assert!(settings.debug);
    }

    #[test]
    fn toml_sample_config() {
        let opts = {
            use std::io::Write;

            let sample_config = r#"
                verbosity = 3

                [service]
                address = "0.0.0.0"
                port = 8383

                [upstream]
                timeout = 10
                user_agent = "registry-proxy-test"

                [routes]
                "docker.example.com" = "https://registry-1.docker.io"
                "quay.example.com" = "https://quay.io"
                "ghcr.example.com" = "https://ghcr.io"
            "#;

            let mut config_file = tempfile::NamedTempFile::new().unwrap();
            config_file
                .write_fmt(format_args!("{}", sample_config))
                .unwrap();
            FileOptions::read_filepath(config_file.path()).unwrap()
        };

        assert_eq!(opts.verbosity, Some(log::LevelFilter::Trace));
        let srv = opts.service.as_ref().unwrap();
        assert_eq!(srv.port, Some(8383));
        assert_eq!(srv.address, Some("0.0.0.0".parse().unwrap()));

        let routes = opts.routes.as_ref().unwrap();
        assert_eq!(routes.len(), 3);
        assert_eq!(routes["ghcr.example.com"], "https://ghcr.io");

        let mut settings = AppSettings::default();
        settings.try_merge(Some(opts)).unwrap();
        assert_eq!(settings.upstream_timeout, Duration::from_secs(10));
        assert_eq!(settings.user_agent, "registry-proxy-test");
        assert_eq!(settings.routes.len(), 3);
    }

    #[test]
    fn toml_missing_file() {
        FileOptions::read_filepath("/nonexistent/registry-proxy.toml").unwrap_err();
    }
}
