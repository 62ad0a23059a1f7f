//! Manager settings and resolved paths
//!
//! `ManagerSettings` is the manager's own persisted configuration
//! (settings.json). `CorePaths` is the resolved set of on-disk locations
//! handed to every component.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::error::{CoreError, Result};

/// Default Xray-core release to install
pub const DEFAULT_XRAY_VERSION: &str = "1.8.24";

/// Base URL for Xray-core release downloads
pub const DEFAULT_RELEASE_BASE: &str = "https://github.com/XTLS/Xray-core/releases/download";

/// Directory name used under the platform config/data directories
const APP_DIR_NAME: &str = "xray-manager";

/// Core binary file name
#[cfg(target_os = "windows")]
pub const XRAY_BINARY: &str = "xray.exe";

#[cfg(not(target_os = "windows"))]
pub const XRAY_BINARY: &str = "xray";

/// Core configuration file name inside the install directory
pub const XRAY_CONFIG_FILE: &str = "config.json";

/// PID file name inside the data directory
pub const PID_FILE: &str = "xray.pid";

/// Manager settings stored in settings.json
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagerSettings {
    /// Xray-core version to install (with or without a leading `v`)
    #[serde(default = "default_version")]
    pub version: String,

    /// Base URL that release archives are fetched from
    #[serde(default = "default_release_base")]
    pub release_base: String,

    /// HTTP(S)/SOCKS proxy used for downloads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// Where the core binary and its config.json live
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<String>,

    /// Where the PID file and logs live
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Check downloaded archives against the published .dgst file
    #[serde(default = "default_verify_digest")]
    pub verify_digest: bool,
}

fn default_version() -> String {
    DEFAULT_XRAY_VERSION.to_string()
}

fn default_release_base() -> String {
    DEFAULT_RELEASE_BASE.to_string()
}

fn default_verify_digest() -> bool {
    true
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            version: default_version(),
            release_base: default_release_base(),
            proxy: None,
            install_dir: None,
            data_dir: None,
            verify_digest: default_verify_digest(),
        }
    }
}

impl ManagerSettings {
    /// Default location of settings.json
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
            .join("settings.json")
    }

    /// Load settings from disk, or return defaults if missing or unreadable
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid settings at {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;

        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Version string without a leading `v`
    pub fn normalized_version(&self) -> Result<&str> {
        let version = self.version.trim().trim_start_matches('v');
        if version.is_empty() {
            return Err(CoreError::Settings("core version is empty".to_string()));
        }
        Ok(version)
    }

    /// Resolve all on-disk locations from these settings
    pub fn paths(&self) -> CorePaths {
        let data_dir = match &self.data_dir {
            Some(dir) if !dir.is_empty() => expand_path(dir),
            _ => default_data_dir(),
        };
        let install_dir = match &self.install_dir {
            Some(dir) if !dir.is_empty() => expand_path(dir),
            _ => data_dir.join("core"),
        };
        CorePaths::new(install_dir, data_dir).absolutize()
    }
}

/// Resolved on-disk locations shared by the components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorePaths {
    /// Directory holding the binary, its assets and config.json
    pub install_dir: PathBuf,
    /// Directory holding the PID file and logs
    pub data_dir: PathBuf,
}

impl CorePaths {
    pub fn new(install_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Resolve relative directories against the current working directory
    ///
    /// The core is launched from its install directory, so a relative
    /// binary or config path would otherwise be resolved twice.
    pub fn absolutize(self) -> Self {
        let Ok(cwd) = std::env::current_dir() else {
            return self;
        };
        let resolve = |dir: PathBuf| if dir.is_absolute() { dir } else { cwd.join(dir) };
        Self {
            install_dir: resolve(self.install_dir),
            data_dir: resolve(self.data_dir),
        }
    }

    /// Path to the xray binary
    pub fn binary(&self) -> PathBuf {
        self.install_dir.join(XRAY_BINARY)
    }

    /// Path to the core's config.json
    pub fn config(&self) -> PathBuf {
        self.install_dir.join(XRAY_CONFIG_FILE)
    }

    /// Path to the PID file
    pub fn pid_file(&self) -> PathBuf {
        self.data_dir.join(PID_FILE)
    }

    /// Directory for rolling log files
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
    }

    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
    }

    #[cfg(target_os = "linux")]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".xray-manager")
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        PathBuf::from(".").join(APP_DIR_NAME)
    }
}

/// Expand a leading `~` to the home directory
fn expand_path(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
