//! Purpose: Resolve client configuration from flags, environment, and defaults.
//! Exports: `ClientConfig`, `ConfigOverrides`, `default_data_dir`, env/default constants.
//! Role: Keep CLI and library callers on one resolution order.
//! Invariants: Precedence is explicit override, then environment, then default.
//! Invariants: Default data directory remains `~/.storefront`.

use crate::core::transport::DEFAULT_TIMEOUT;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const BASE_URL_ENV: &str = "STOREFRONT_BASE_URL";
pub const DIR_ENV: &str = "STOREFRONT_DIR";

const SECURE_SUBDIR: &str = "secure";
const PREFS_SUBDIR: &str = "prefs";

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub tls_ca: Option<PathBuf>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub data_dir: PathBuf,
    pub timeout: Duration,
    pub tls_ca: Option<PathBuf>,
}

impl ClientConfig {
    pub fn resolve(overrides: ConfigOverrides) -> Self {
        Self::resolve_with(overrides, |name| std::env::var(name).ok())
    }

    pub fn resolve_with(
        overrides: ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let env = |name: &str| env(name).filter(|value| !value.trim().is_empty());
        let base_url = overrides
            .base_url
            .or_else(|| env(BASE_URL_ENV))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let data_dir = overrides
            .data_dir
            .or_else(|| env(DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(default_data_dir);
        Self {
            base_url,
            data_dir,
            timeout: overrides.timeout.unwrap_or(DEFAULT_TIMEOUT),
            tls_ca: overrides.tls_ca,
        }
    }

    /// Encrypted entries (session identity).
    pub fn secure_dir(&self) -> PathBuf {
        self.data_dir.join(SECURE_SUBDIR)
    }

    /// Plain entries (recently viewed ids).
    pub fn prefs_dir(&self) -> PathBuf {
        self.data_dir.join(PREFS_SUBDIR)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

pub fn default_data_dir() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(".storefront")
}
