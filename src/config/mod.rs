//! Checkout configuration for gitdep
//!
//! [`CheckoutConfig`] carries the settings the checkout engine reads:
//! the project working directory and packages directory (which together
//! determine the persistent working directory for endpoints with a stable
//! name), whether in-place direct updates are enabled, and proxy settings
//! used by the failure diagnostics.
//!
//! Configuration is loaded from `~/.gitdep/config.toml` when present, with
//! proxy settings falling back to the standard `HTTP_PROXY`/`HTTPS_PROXY`
//! environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Settings consumed by the checkout engine.
///
/// Values not present in the configuration file take their defaults;
/// proxy settings additionally fall back to the conventional environment
/// variables so a proxied environment is detected without any file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Project working directory. Persistent package directories are
    /// resolved relative to this.
    pub cwd: PathBuf,

    /// Directory under `cwd` where named packages are materialized.
    pub packages_dir: String,

    /// Whether endpoints with a stable name may be updated in place
    /// (fetch + hard reset) instead of cloned fresh.
    pub direct_update: bool,

    /// HTTP proxy, if any. Only consulted for failure diagnostics.
    pub proxy: Option<String>,

    /// HTTPS proxy, if any. Only consulted for failure diagnostics.
    pub https_proxy: Option<String>,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            cwd: PathBuf::from("."),
            packages_dir: "packages".to_string(),
            direct_update: false,
            proxy: None,
            https_proxy: None,
        }
    }
}

impl CheckoutConfig {
    /// Load configuration from the default location, falling back to
    /// defaults when no file exists. Proxy settings absent from the file are
    /// taken from `HTTP_PROXY`/`HTTPS_PROXY`.
    pub async fn load() -> Result<Self> {
        let path = Self::default_path()?;
        let mut config = if path.exists() {
            Self::load_from(&path).await?
        } else {
            Self::default()
        };
        config.apply_proxy_env();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Default configuration file location: `~/.gitdep/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".gitdep").join("config.toml"))
            .context("Could not determine home directory")
    }

    /// The persistent working directory for a package with a stable name.
    #[must_use]
    pub fn working_dir_for(&self, name: &str) -> PathBuf {
        self.cwd.join(&self.packages_dir).join(name)
    }

    /// Whether any proxy is configured. Drives the proxy remediation
    /// diagnostics on `git://` failures.
    #[must_use]
    pub fn has_proxy(&self) -> bool {
        self.proxy.is_some() || self.https_proxy.is_some()
    }

    fn apply_proxy_env(&mut self) {
        if self.proxy.is_none() {
            self.proxy = std::env::var("HTTP_PROXY").or_else(|_| std::env::var("http_proxy")).ok();
        }
        if self.https_proxy.is_none() {
            self.https_proxy =
                std::env::var("HTTPS_PROXY").or_else(|_| std::env::var("https_proxy")).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CheckoutConfig::default();
        assert_eq!(config.cwd, PathBuf::from("."));
        assert_eq!(config.packages_dir, "packages");
        assert!(!config.direct_update);
        assert!(!config.has_proxy());
    }

    #[test]
    fn test_working_dir_for_named_package() {
        let config = CheckoutConfig {
            cwd: PathBuf::from("/work/project"),
            ..CheckoutConfig::default()
        };
        assert_eq!(config.working_dir_for("jquery"), PathBuf::from("/work/project/packages/jquery"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(
            &path,
            r#"
packages_dir = "deps"
direct_update = true
proxy = "http://proxy.local:8080"
"#,
        )
        .await
        .unwrap();

        let config = CheckoutConfig::load_from(&path).await.unwrap();
        assert_eq!(config.packages_dir, "deps");
        assert!(config.direct_update);
        assert!(config.has_proxy());
    }

    #[tokio::test]
    async fn test_load_from_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "packages_dir = [not toml").await.unwrap();
        assert!(CheckoutConfig::load_from(&path).await.is_err());
    }
}
