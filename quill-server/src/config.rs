//! Command line and environment configuration

use crate::error::ServerError;
use clap::{Arg, ArgAction, ArgMatches, Command};
use quill_core::auth::Hs256Signer;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Validated server configuration
#[derive(Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub bind: SocketAddr,
    pub secret_key: String,
    pub token_ttl: Duration,
    pub log_json: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("data_dir", &self.data_dir)
            .field("bind", &self.bind)
            .field("secret_key", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("log_json", &self.log_json)
            .finish()
    }
}

/// CLI definition; every flag falls back to a `QUILL_*` environment variable
pub fn command() -> Command {
    Command::new("quill-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Authenticated notes service with optimistic concurrency control")
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .env("QUILL_DATA_DIR")
                .value_name("PATH")
                .help("Data directory path")
                .default_value("./data"),
        )
        .arg(
            Arg::new("bind")
                .long("bind")
                .env("QUILL_BIND")
                .value_name("ADDR")
                .help("Bind address")
                .default_value("127.0.0.1:8000"),
        )
        .arg(
            Arg::new("secret-key")
                .long("secret-key")
                .env("QUILL_SECRET_KEY")
                .value_name("SECRET")
                .help("Token signing secret (at least 32 bytes)")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("token-ttl-minutes")
                .long("token-ttl-minutes")
                .env("QUILL_TOKEN_TTL_MINUTES")
                .value_name("MINUTES")
                .help("Bearer token lifetime")
                .default_value("30"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .env("QUILL_LOG_JSON")
                .help("Emit logs as JSON")
                .action(ArgAction::SetTrue),
        )
}

impl ServerConfig {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, ServerError> {
        let data_dir = PathBuf::from(required(matches, "data-dir")?);

        let bind = required(matches, "bind")?
            .parse::<SocketAddr>()
            .map_err(|e| ServerError::Config(format!("invalid bind address: {}", e)))?;

        let secret_key = required(matches, "secret-key")?.to_string();
        if secret_key.len() < Hs256Signer::MIN_KEY_LENGTH {
            return Err(ServerError::Config(format!(
                "secret key must be at least {} bytes",
                Hs256Signer::MIN_KEY_LENGTH
            )));
        }

        let minutes = required(matches, "token-ttl-minutes")?
            .parse::<u64>()
            .map_err(|e| ServerError::Config(format!("invalid token ttl: {}", e)))?;
        let token_ttl = match minutes.checked_mul(60) {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                return Err(ServerError::Config(format!(
                    "token ttl out of range: {} minutes",
                    minutes
                )))
            }
        };

        Ok(ServerConfig {
            data_dir,
            bind,
            secret_key,
            token_ttl,
            log_json: matches.get_flag("log-json"),
        })
    }
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str, ServerError> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| ServerError::Config(format!("missing --{}", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn parse(args: &[&str]) -> Result<ServerConfig, ServerError> {
        let matches = command()
            .try_get_matches_from(std::iter::once("quill-server").chain(args.iter().copied()))
            .map_err(|e| ServerError::Config(e.to_string()))?;
        ServerConfig::from_matches(&matches)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--secret-key", SECRET]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.bind, "127.0.0.1:8000".parse().unwrap());
        assert_eq!(config.token_ttl, Duration::from_secs(30 * 60));
        assert!(!config.log_json);
    }

    #[test]
    fn test_overrides() {
        let config = parse(&[
            "--secret-key",
            SECRET,
            "--bind",
            "0.0.0.0:9000",
            "--data-dir",
            "/tmp/quill",
            "--token-ttl-minutes",
            "5",
            "--log-json",
        ])
        .unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/quill"));
        assert_eq!(config.token_ttl, Duration::from_secs(300));
        assert!(config.log_json);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(parse(&["--secret-key", "too-short"]).is_err());
        assert!(parse(&["--secret-key", SECRET, "--bind", "nowhere"]).is_err());
        assert!(parse(&["--secret-key", SECRET, "--token-ttl-minutes", "0"]).is_err());
        assert!(parse(&["--secret-key", SECRET, "--token-ttl-minutes", "soon"]).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = parse(&["--secret-key", SECRET]).unwrap();
        assert!(!format!("{:?}", config).contains(SECRET));
    }
}
