//! Command-line interface parsing for the deskboard server
//!
//! Flags override the values loaded from `config.json`.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// Deskboard - personal dashboard backend with cached widget data
#[derive(Parser, Debug)]
#[command(name = "deskboard")]
#[command(about = "Personal dashboard backend serving cached widget data")]
#[command(version)]
pub struct Cli {
    /// Address to bind (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Path to the SQLite database (overrides config)
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Config file to use instead of the platform default
    ///
    /// Created with default values if it does not exist.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Applies flag overrides on top of a loaded config
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(db) = &self.db {
            config.db_path = db.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_args() {
        let cli = Cli::parse_from(["deskboard"]);
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.db.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_parse_all_flags() {
        let cli = Cli::parse_from([
            "deskboard",
            "--host",
            "0.0.0.0",
            "-p",
            "8080",
            "--db",
            "/tmp/board.db",
            "--config",
            "/tmp/config.json",
        ]);
        assert_eq!(cli.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(cli.port, Some(8080));
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/board.db")));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.json")));
    }

    #[test]
    fn test_cli_rejects_invalid_port() {
        assert!(Cli::try_parse_from(["deskboard", "--port", "not-a-port"]).is_err());
        assert!(Cli::try_parse_from(["deskboard", "--port", "70000"]).is_err());
    }

    #[test]
    fn test_apply_overrides_only_given_flags() {
        let cli = Cli::parse_from(["deskboard", "--port", "9000"]);
        let config = cli.apply(Config::default());

        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.db_path, Config::default().db_path);
    }

    #[test]
    fn test_apply_without_flags_keeps_config() {
        let cli = Cli::parse_from(["deskboard"]);
        let base = Config {
            host: "127.0.0.1".to_string(),
            ..Config::default()
        };
        assert_eq!(cli.apply(base.clone()), base);
    }
}
