//! Command-line options for registry-proxy.

use super::options;
use super::AppSettings;
use commons::prelude_errors::*;
use commons::{parse_route, MergeOptions};

/// CLI configuration flags, top-level.
#[derive(Debug, StructOpt)]
pub struct CliOptions {
    /// Verbosity level
    #[structopt(short = "v", parse(from_occurrences))]
    pub verbosity: u64,

    /// Path to configuration file
    #[structopt(short = "c")]
    pub config_path: Option<String>,

    /// Route definition, as `<hostname>=<upstream URL>` (repeatable)
    #[structopt(long = "route", parse(try_from_str = parse_route))]
    pub routes: Vec<(String, String)>,

    // Main service options
    #[structopt(flatten)]
    pub service: options::ServiceOptions,

    // Status service options
    #[structopt(flatten)]
    pub status: options::StatusOptions,

    // Upstream options
    #[structopt(flatten)]
    pub upstream: options::UpstreamOptions,
}

impl MergeOptions<CliOptions> for AppSettings {
    fn try_merge(&mut self, opts: CliOptions) -> Fallible<()> {
        self.verbosity = match opts.verbosity {
            0 => self.verbosity,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        self.routes.extend(opts.routes);
        self.try_merge(Some(opts.service))?;
        self.try_merge(Some(opts.status))?;
        self.try_merge(Some(opts.upstream))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::CliOptions;
    use crate::config::AppSettings;
    use commons::MergeOptions;
    use std::time::Duration;
    use structopt::StructOpt;

    #[test]
    fn cli_basic() {
        let no_args = vec!["argv0"];
        let no_args_cli = CliOptions::from_iter_safe(no_args).unwrap();
        assert_eq!(no_args_cli.verbosity, 0);
        assert!(no_args_cli.routes.is_empty());
        assert_eq!(no_args_cli.service.debug, None);

        let verbose_args = vec!["argv0", "-vvv"];
        let verbose_cli = CliOptions::from_iter_safe(verbose_args).unwrap();
        assert_eq!(verbose_cli.verbosity, 3);

        let svc_port_args = vec!["argv0", "--service.port", "9999"];
        let svc_port_cli = CliOptions::from_iter_safe(svc_port_args).unwrap();
        assert_eq!(svc_port_cli.service.port, Some(9999));

        let debug_args = vec!["argv0", "--service.debug", "true"];
        let debug_cli = CliOptions::from_iter_safe(debug_args).unwrap();
        assert_eq!(debug_cli.service.debug, Some(true));

        let timeout_args = vec!["argv0", "--upstream.timeout", "12"];
        let timeout_cli = CliOptions::from_iter_safe(timeout_args).unwrap();
        assert_eq!(timeout_cli.upstream.timeout, Some(Duration::from_secs(12)));
    }

    #[test]
    fn cli_routes() {
        let args = vec![
            "argv0",
            "--route",
            "docker.example.com=https://registry-1.docker.io",
            "--route",
            "quay.example.com=https://quay.io/",
        ];
        let cli = CliOptions::from_iter_safe(args).unwrap();
        assert_eq!(
            cli.routes,
            vec![
                (
                    "docker.example.com".to_string(),
                    "https://registry-1.docker.io".to_string()
                ),
                ("quay.example.com".to_string(), "https://quay.io".to_string()),
            ]
        );

        let mut settings = AppSettings::default();
        settings.try_merge(cli).unwrap();
        assert_eq!(
            settings.routes.get("quay.example.com").map(String::as_str),
            Some("https://quay.io")
        );

        let bad_args = vec!["argv0", "--route", "quay.example.com"];
        CliOptions::from_iter_safe(bad_args).unwrap_err();
    }

    #[test]
    fn cli_override_toml() {
        use crate::config::file::FileOptions;

        let mut settings = AppSettings::default();
        assert_eq!(settings.verbosity, log::LevelFilter::Warn);

        let toml_verbosity = "verbosity=3";
        let file_opts: FileOptions = toml::from_str(toml_verbosity).unwrap();
        assert_eq!(file_opts.verbosity, Some(log::LevelFilter::Trace));

        settings.try_merge(Some(file_opts)).unwrap();
        assert_eq!(settings.verbosity, log::LevelFilter::Trace);

        let args = vec!["argv0", "-vv"];
        let cli_opts = CliOptions::from_iter_safe(args).unwrap();
        assert_eq!(cli_opts.verbosity, 2);

        settings.try_merge(cli_opts).unwrap();
        assert_eq!(settings.verbosity, log::LevelFilter::Debug);
    }
}
