//! Client configuration.
//!
//! Stored as TOML at `~/.config/rhremote/client.toml` unless a path is
//! given on the command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use rhremote_protocol::DEFAULT_REMOTE_PORT;
use rhremote_session::SessionConfig;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Unix socket the local roothelper listens on.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Port of the remote roothelper server.
    #[serde(default = "default_remote_port")]
    pub remote_port: u16,

    /// Budget for the connect handshake, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/roothelper.sock")
}

fn default_remote_port() -> u16 {
    DEFAULT_REMOTE_PORT
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_log_filter() -> String {
    "info,rhremote=debug".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            remote_port: default_remote_port(),
            connect_timeout_secs: default_connect_timeout(),
            log_filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, writing the defaults there first if
    /// the file does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, toml::to_string_pretty(self)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            remote_port: self.remote_port,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }
}

/// Default configuration file location.
pub fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home)
        .join(".config")
        .join("rhremote")
        .join("client.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.remote_port, 11111);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.log_filter, "info,rhremote=debug");
        assert_eq!(
            config.session_config().connect_timeout,
            Duration::from_secs(10)
        );
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: Config = toml::from_str(r#"remote_port = 2222"#).unwrap();
        assert_eq!(config.remote_port, 2222);
        assert_eq!(config.socket_path, default_socket_path());
        assert_eq!(config.session_config().remote_port, 2222);
    }

    #[test]
    fn load_creates_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("client.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("client.toml");
        let config = Config {
            socket_path: "/dev/socket/rh".into(),
            connect_timeout_secs: 3,
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn config_path_under_rhremote() {
        assert!(config_path().ends_with("rhremote/client.toml"));
    }
}
