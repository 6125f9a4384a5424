use std::{io::IsTerminal, net::SocketAddr, path::PathBuf, str::FromStr};

use clap::{Parser, ValueEnum};
use config::Config;
use log::LevelFilter;
use logforth::filter::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "Gatekeeper", version, long_about = concat!("Gatekeeper v", env!("CARGO_PKG_VERSION")))]
pub struct Args {
    /// IP address on which the server will listen for incoming connections.
    /// Overrides `server.listen_address` from the configuration (default: 127.0.0.1:3000).
    #[arg(short, long, env = "GATEKEEPER_LISTEN_ADDRESS")]
    pub listen_address: Option<SocketAddr>,
    /// Path to the TOML configuration file
    #[arg(long, short, env = "GATEKEEPER_CONFIG_PATH", default_value = "./gatekeeper.toml")]
    pub config: PathBuf,
    /// Logging level of the gatekeeper crates (off, error, warn, info, debug, trace).
    /// Other crates log warnings and errors only.
    #[arg(long = "log", env = "GATEKEEPER_LOG", default_value_t = LevelFilter::Info)]
    pub log_level: LevelFilter,
    /// Style of log output. Colorized when stdout is a terminal, plain text otherwise.
    #[arg(long, env = "GATEKEEPER_LOG_STYLE", value_enum)]
    pub log_style: Option<LogStyle>,
}

impl Args {
    pub fn config(&self) -> anyhow::Result<Config> {
        let config = if self.config.exists() {
            Config::load(&self.config)?
        } else {
            log::warn!(
                "Configuration file {} not found, using defaults",
                self.config.display()
            );

            let config = Config::default();
            config.validate()?;

            config
        };

        Ok(config)
    }

    pub fn log_style(&self) -> LogStyle {
        match self.log_style {
            Some(style) => style,
            None if std::io::stdout().is_terminal() => LogStyle::Color,
            None => LogStyle::Text,
        }
    }

    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::from_str(&filter_directives(self.log_level)).expect("These all are valid env filters.")
    }
}

fn filter_directives(level: LevelFilter) -> String {
    if level == LevelFilter::Off {
        return "off".to_string();
    }

    let level = level.as_str().to_ascii_lowercase();

    format!("warn,gatekeeper={level},server={level},config={level},llm={level},rate_limit={level}")
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogStyle {
    /// Colorized text
    Color,
    /// Plain text
    Text,
    /// JSON objects
    Json,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "gatekeeper",
            "--listen-address",
            "0.0.0.0:8080",
            "--config",
            "/etc/gatekeeper.toml",
            "--log",
            "debug",
            "--log-style",
            "json",
        ])
        .unwrap();

        assert_eq!(args.listen_address.unwrap().to_string(), "0.0.0.0:8080");
        assert_eq!(args.config, PathBuf::from("/etc/gatekeeper.toml"));
        assert_eq!(args.log_level, LevelFilter::Debug);
        assert_eq!(args.log_style(), LogStyle::Json);
    }

    #[test]
    fn logging_defaults_to_info() {
        let args = Args::try_parse_from(["gatekeeper"]).unwrap();

        assert_eq!(args.log_level, LevelFilter::Info);
        assert_eq!(args.log_style, None);
    }

    #[test]
    fn workspace_crates_follow_selected_level() {
        assert_eq!(filter_directives(LevelFilter::Off), "off");
        assert_eq!(
            filter_directives(LevelFilter::Debug),
            "warn,gatekeeper=debug,server=debug,config=debug,llm=debug,rate_limit=debug"
        );
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let args = Args::try_parse_from(["gatekeeper", "--config", "/nonexistent/gatekeeper.toml"]).unwrap();
        let config = args.config().unwrap();

        assert_eq!(config.server.listen_address.to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn config_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nlisten_address = \"127.0.0.1:4321\"").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let args = Args::try_parse_from(["gatekeeper", "--config", path.as_str()]).unwrap();

        assert_eq!(args.config().unwrap().server.listen_address.port(), 4321);
    }
}
