//! Layered configuration for Deplik.
//!
//! Values are resolved in order: `deplik.toml` → environment → CLI flags.
//! A missing file is not an error; every field has a default.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//! dev_mode = false
//!
//! [backend]
//! url = "http://127.0.0.1:8080"
//! connect_timeout_secs = 10
//! request_timeout_secs = 30
//!
//! [logging]
//! level = "info"
//! json = false
//! directory = ".deplik/logs"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "deplik.toml";

pub const ENV_HOST: &str = "DEPLIK_HOST";
pub const ENV_PORT: &str = "DEPLIK_PORT";
pub const ENV_BACKEND_URL: &str = "DEPLIK_BACKEND_URL";
pub const ENV_LOG_LEVEL: &str = "DEPLIK_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Binds all interfaces and enables permissive CORS for a separate dev server.
    pub dev_mode: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    /// Base URL of the analysis backend exposing `/run` and `/logs/{id}`.
    pub url: String,
    pub connect_timeout_secs: u64,
    /// Applies to run submission only; log streams stay open indefinitely.
    pub request_timeout_secs: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

impl BackendSection {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub json: bool,
    /// When set, logs are also written to a daily rolling file here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeplikConfig {
    pub server: ServerSection,
    pub backend: BackendSection,
    pub logging: LoggingSection,
}

/// CLI-level overrides, applied last.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub backend_url: Option<String>,
    pub dev_mode: bool,
    pub log_level: Option<String>,
}

impl DeplikConfig {
    /// Load from an explicit file, or `deplik.toml` in `dir` when present.
    pub fn load(dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default_path = dir.join(CONFIG_FILE_NAME);
                if !default_path.exists() {
                    return Ok(Self::default());
                }
                default_path
            }
        };

        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Taking a lookup function keeps tests off the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            self.server.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid {} value '{}'", ENV_PORT, port))?;
        }
        if let Some(url) = lookup(ENV_BACKEND_URL) {
            self.backend.url = url;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(url) = &cli.backend_url {
            self.backend.url = url.clone();
        }
        if cli.dev_mode {
            self.server.dev_mode = true;
        }
        if let Some(level) = &cli.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Full resolution: file, then process environment, then CLI.
    pub fn resolve(dir: &Path, explicit: Option<&Path>, cli: &CliOverrides) -> Result<Self> {
        let mut config = Self::load(dir, explicit)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.backend.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!(
                "Invalid backend url '{}': must start with http:// or https://",
                self.backend.url
            );
        }
        if self.backend.connect_timeout_secs == 0 {
            anyhow::bail!("backend.connect_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// Address the server binds to. Dev mode listens on all interfaces.
    pub fn bind_address(&self) -> String {
        let host = if self.server.dev_mode {
            "0.0.0.0"
        } else {
            self.server.host.as_str()
        };
        format!("{}:{}", host, self.server.port)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Write a default `deplik.toml` into `dir`, refusing to overwrite.
    pub fn write_default(dir: &Path) -> Result<PathBuf> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }
        let content = Self::default().to_toml()?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = DeplikConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.backend.url, "http://127.0.0.1:8080");
        assert_eq!(config.backend.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.directory.is_none());
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let config = DeplikConfig::load(dir.path(), None).unwrap();
        assert_eq!(config, DeplikConfig::default());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[backend]\nurl = \"http://10.0.0.5:8080\"\n",
        )
        .unwrap();

        let config = DeplikConfig::load(dir.path(), None).unwrap();
        assert_eq!(config.backend.url, "http://10.0.0.5:8080");
        assert_eq!(config.backend.connect_timeout_secs, 10);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_load_explicit_missing_file_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(DeplikConfig::load(dir.path(), Some(&missing)).is_err());
    }

    #[test]
    fn test_load_invalid_toml_errors() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[server\nport = ").unwrap();
        let err = DeplikConfig::load(dir.path(), None).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            (ENV_PORT, "4000"),
            (ENV_BACKEND_URL, "http://backend:9000"),
            (ENV_LOG_LEVEL, "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = DeplikConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.backend.url, "http://backend:9000");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_env_invalid_port_errors() {
        let mut config = DeplikConfig::default();
        let err = config
            .apply_env(|key| (key == ENV_PORT).then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_PORT));
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut config = DeplikConfig::default();
        config
            .apply_env(|key| (key == ENV_PORT).then(|| "4000".to_string()))
            .unwrap();
        config.apply_cli(&CliOverrides {
            port: Some(5000),
            dev_mode: true,
            ..Default::default()
        });
        assert_eq!(config.server.port, 5000);
        assert!(config.server.dev_mode);
    }

    #[test]
    fn test_validate_rejects_non_http_backend() {
        let mut config = DeplikConfig::default();
        config.backend.url = "ftp://example.com".into();
        assert!(config.validate().is_err());
        config.backend.url = "https://example.com".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bind_address() {
        let mut config = DeplikConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
        config.server.dev_mode = true;
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_write_default_round_trips_and_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = DeplikConfig::write_default(dir.path()).unwrap();
        assert!(path.exists());

        let loaded = DeplikConfig::load(dir.path(), None).unwrap();
        assert_eq!(loaded, DeplikConfig::default());

        assert!(DeplikConfig::write_default(dir.path()).is_err());
    }
}
