//! Environment-sourced configuration.
//!
//! Everything comes from environment variables, optionally seeded from a
//! dotenv-style `KEY=VALUE` file: a `.env` next to the process fills in
//! gaps without overriding the real environment, while an explicit
//! `ENV_FILE` path wins over it.

use std::env;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use tracing::debug;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid RELAY_MODE '{0}' (expected relay, send or recv)")]
    InvalidMode(String),

    #[error("Invalid bind address '{0}'")]
    InvalidBindAddr(String),

    #[error("Invalid port value '{0}'")]
    InvalidPort(String),

    #[error("PEER_ADDR is required in send mode")]
    MissingPeer,

    #[error("Failed to read env file {0}: {1}")]
    EnvFile(String, std::io::Error),
}

/// Which of the relay variants this process runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayMode {
    /// Socket-server variant: observer listener, optional peer, replay of
    /// remote events onto the local virtual pad.
    Relay,
    /// Point-to-point UDP sender next to the physical pad.
    Send,
    /// Point-to-point UDP receiver next to the virtual pad.
    Recv,
}

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub mode: RelayMode,
    /// Observer listener (relay mode) or UDP receive socket (recv mode).
    pub bind: SocketAddr,
    /// `host:port` of the peer (relay mode, optional) or the remote
    /// receiver (send mode, required).
    pub peer: Option<String>,
    /// Node identity override; a fresh UUID is generated when absent.
    pub server_id: Option<String>,
    /// Explicit input device path; autodetection when absent.
    pub device_path: Option<String>,
}

impl RelayConfig {
    /// Read configuration from the process environment, loading env files
    /// first. Any parse failure here is a fatal startup error.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Some(path) = var("ENV_FILE") {
            load_env_file(Path::new(&path), true)?;
        } else if Path::new(".env").is_file() {
            load_env_file(Path::new(".env"), false)?;
        }

        let mode = match var("RELAY_MODE").as_deref() {
            None | Some("relay") => RelayMode::Relay,
            Some("send") => RelayMode::Send,
            Some("recv") => RelayMode::Recv,
            Some(other) => return Err(ConfigError::InvalidMode(other.to_string())),
        };

        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: IpAddr = bind_addr
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddr(bind_addr.clone()))?;
        let bind_port = parse_port(var("BIND_PORT"))?;
        let bind = SocketAddr::new(bind_addr, bind_port);

        let peer_port = parse_port(var("PEER_PORT"))?;
        let peer = var("PEER_ADDR").map(|addr| format!("{addr}:{peer_port}"));
        if mode == RelayMode::Send && peer.is_none() {
            return Err(ConfigError::MissingPeer);
        }

        Ok(Self {
            mode,
            bind,
            peer,
            server_id: var("SERVER_ID"),
            device_path: var("DEVICE_PATH"),
        })
    }
}

/// Like `env::var` but treating empty values as unset.
fn var(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn parse_port(value: Option<String>) -> Result<u16, ConfigError> {
    match value {
        None => Ok(DEFAULT_PORT),
        Some(raw) => raw
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(raw)),
    }
}

/// Load a `KEY=VALUE` file into the process environment.
fn load_env_file(path: &Path, override_existing: bool) -> Result<(), ConfigError> {
    let text = fs::read_to_string(path)
        .map_err(|e| ConfigError::EnvFile(path.display().to_string(), e))?;
    for (key, value) in parse_env_lines(&text) {
        if override_existing || env::var_os(&key).is_none() {
            debug!("env file sets {}", key);
            env::set_var(key, value);
        }
    }
    Ok(())
}

/// Parse dotenv-style lines: blanks and `#` comments are skipped, values may
/// be wrapped in double quotes.
fn parse_env_lines(text: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim().trim_matches('"');
        entries.push((key.to_string(), value.to_string()));
    }
    entries
}
