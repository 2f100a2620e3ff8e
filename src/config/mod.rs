// ABOUTME: Configuration types and parsing for sshbatch.yml.
// ABOUTME: Handles YAML parsing, env var secrets, and conversion into connection settings.

mod env_value;
mod target;

pub use env_value::EnvValue;
pub use target::Target;

use crate::error::{Error, Result};
use crate::ssh::{ConnectionConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "sshbatch.yml";
pub const CONFIG_FILENAME_ALT: &str = "sshbatch.yaml";
pub const DEFAULT_DELIMITER: &str = "\n";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub host: Option<Target>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<EnvValue>,

    #[serde(default)]
    pub key_path: Option<PathBuf>,

    #[serde(default)]
    pub key_passphrase: Option<EnvValue>,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Option<Duration>,

    #[serde(default, with = "humantime_serde")]
    pub command_timeout: Option<Duration>,

    #[serde(default)]
    pub commands: Option<NonEmpty<String>>,

    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_connect_timeout() -> Option<Duration> {
    Some(DEFAULT_CONNECT_TIMEOUT)
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            user: None,
            password: None,
            key_path: None,
            key_passphrase: None,
            connect_timeout: default_connect_timeout(),
            command_timeout: None,
            commands: None,
            delimiter: default_delimiter(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load `sshbatch.yml` (or `.yaml`) from `dir` if present.
    pub fn discover(dir: &Path) -> Result<Option<Self>> {
        let candidates = [dir.join(CONFIG_FILENAME), dir.join(CONFIG_FILENAME_ALT)];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "using config file");
                return Self::load(path).map(Some);
            }
        }

        Ok(None)
    }

    /// Resolve secrets and defaults into settings for [`crate::ssh::Connection`].
    ///
    /// The user comes from `user`, then `user@` in the host, then `$USER`.
    /// The port comes from `port`, then `:port` in the host, then 22.
    /// A timeout of zero disables that timeout.
    pub fn connection_config(&self) -> Result<ConnectionConfig> {
        let target = self
            .host
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig("no host given".to_string()))?;

        let user = self
            .user
            .clone()
            .or_else(|| target.user.clone())
            .or_else(|| std::env::var("USER").ok())
            .filter(|user| !user.is_empty())
            .ok_or_else(|| Error::InvalidConfig("no user given".to_string()))?;

        let port = self.port.or(target.port).unwrap_or(DEFAULT_PORT);

        let mut config = ConnectionConfig::new(&target.host, user)
            .port(port)
            .connect_timeout(enabled(self.connect_timeout))
            .command_timeout(enabled(self.command_timeout));

        if let Some(password) = &self.password {
            config.password = Some(password.resolve()?);
        }
        if let Some(key_path) = &self.key_path {
            config.key_path = Some(expand_home(key_path));
        }
        if let Some(passphrase) = &self.key_passphrase {
            config.key_passphrase = Some(passphrase.resolve()?);
        }

        Ok(config)
    }
}

/// A zero timeout means no limit.
fn enabled(timeout: Option<Duration>) -> Option<Duration> {
    timeout.filter(|limit| !limit.is_zero())
}

/// Expand a leading `~/` using `$HOME`.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
