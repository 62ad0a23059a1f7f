//! Config store for the core's config.json
//!
//! All reads and writes of the runtime configuration go through here.
//! Writes are full replacements: the old file is removed first so no
//! stale fields can survive a rewrite.

use super::error::{CoreError, Result};
use super::xray_config::{OutboundToggle, XrayConfig};
use std::fs;
use std::path::{Path, PathBuf};

/// Owner of the core configuration file
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the managed config.json
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the config on disk with `config`
    pub fn write(&self, config: &XrayConfig) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        self.write_file(config)?;
        log::debug!("Core config rewritten at {}", self.path.display());
        Ok(())
    }

    /// Load the config, or `None` when it is missing or unparsable
    pub fn read(&self) -> Option<XrayConfig> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(_) => return None,
        };

        match serde_json::from_str(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                log::debug!("Core config at {} is not usable: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Write the built-in default configuration
    pub fn write_default(&self) -> Result<XrayConfig> {
        let config = XrayConfig::default_config();
        self.write_file(&config)?;
        log::info!("Default core config written to {}", self.path.display());
        Ok(config)
    }

    /// Set the enabled flag of the first outbound matching `toggle`
    pub fn toggle_outbound(&self, toggle: &OutboundToggle) -> Result<XrayConfig> {
        let mut config = self
            .read()
            .ok_or_else(|| CoreError::MissingConfiguration(self.path.display().to_string()))?;

        let outbound = config
            .outbounds
            .iter_mut()
            .find(|outbound| toggle.matches(outbound))
            .ok_or_else(|| CoreError::OutboundNotFound(toggle.describe()))?;
        outbound.enabled = toggle.enabled;

        self.write(&config)?;

        log::info!(
            "Outbound {} {}",
            toggle.describe(),
            if toggle.enabled { "enabled" } else { "disabled" }
        );
        Ok(config)
    }

    /// Enable the outbound identified by `toggle`'s selector
    pub fn enable_outbound(&self, toggle: &OutboundToggle) -> Result<XrayConfig> {
        self.toggle_outbound(&OutboundToggle::new(toggle.selector.clone(), true))
    }

    /// Disable the outbound identified by `toggle`'s selector
    pub fn disable_outbound(&self, toggle: &OutboundToggle) -> Result<XrayConfig> {
        self.toggle_outbound(&OutboundToggle::new(toggle.selector.clone(), false))
    }

    fn write_file(&self, config: &XrayConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xray::xray_config::{Inbound, Outbound};
    use serde_json::{json, Map, Value};
    use tempfile::tempdir;

    fn selector(name: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(name.to_string()));
        map
    }

    fn outbound(name: &str, enabled: bool) -> Outbound {
        Outbound {
            name: Some(name.to_string()),
            protocol: Some("vless".to_string()),
            enabled,
            ..Default::default()
        }
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));

        let mut config = XrayConfig::default_config();
        config.inbounds.push(Inbound {
            port: Some(json!(8080)),
            protocol: Some("http".to_string()),
            ..Default::default()
        });
        config.outbounds[0]
            .extra
            .insert("streamSettings".to_string(), json!({ "network": "ws" }));

        store.write(&config).unwrap();
        assert_eq!(store.read(), Some(config));
    }

    #[test]
    fn test_write_replaces_instead_of_merging() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));

        store.write_default().unwrap();
        let replacement = XrayConfig {
            outbounds: vec![outbound("only", true)],
            ..Default::default()
        };
        store.write(&replacement).unwrap();

        let stored = store.read().unwrap();
        assert!(stored.inbounds.is_empty());
        assert!(!stored.extra.contains_key("log"));
        assert_eq!(stored, replacement);
    }

    #[test]
    fn test_read_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("absent.json"));
        assert!(store.read().is_none());
    }

    #[test]
    fn test_read_malformed_file_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{\"inbounds\": [").unwrap();
        assert!(ConfigStore::new(&path).read().is_none());
    }

    #[test]
    fn test_write_default_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("core").join("config.json"));

        store.write_default().unwrap();
        let config = store.read().unwrap();
        assert!(!config.inbounds.is_empty());
        assert_eq!(config, XrayConfig::default_config());
    }

    #[test]
    fn test_toggle_enables_matching_outbound() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        store
            .write(&XrayConfig {
                outbounds: vec![outbound("A", false)],
                ..Default::default()
            })
            .unwrap();

        store
            .toggle_outbound(&OutboundToggle::new(selector("A"), true))
            .unwrap();

        assert_eq!(store.read().unwrap().outbounds, vec![outbound("A", true)]);
    }

    #[test]
    fn test_toggle_on_config_with_string_port() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        fs::write(
            store.path(),
            r#"{"inbounds": [{"port": "10808", "protocol": "socks"}],
                "outbounds": [{"name": "A", "enabled": false}]}"#,
        )
        .unwrap();

        store
            .toggle_outbound(&OutboundToggle::new(selector("A"), true))
            .unwrap();

        let config = store.read().unwrap();
        assert!(config.outbounds[0].enabled);
        assert_eq!(config.inbounds[0].port, Some(json!("10808")));
    }

    #[test]
    fn test_toggle_twice_restores_and_leaves_others_alone() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        let original = XrayConfig {
            outbounds: vec![outbound("A", false), outbound("B", true), outbound("C", false)],
            ..Default::default()
        };
        store.write(&original).unwrap();

        let toggle = OutboundToggle::new(selector("B"), true);
        store.disable_outbound(&toggle).unwrap();
        let middle = store.read().unwrap();
        assert!(!middle.outbounds[1].enabled);
        assert_eq!(middle.outbounds[0], original.outbounds[0]);
        assert_eq!(middle.outbounds[2], original.outbounds[2]);

        store.enable_outbound(&toggle).unwrap();
        assert_eq!(store.read().unwrap(), original);
    }

    #[test]
    fn test_toggle_unknown_outbound_fails() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        store.write_default().unwrap();

        let err = store
            .toggle_outbound(&OutboundToggle::new(selector("missing"), true))
            .unwrap_err();
        assert!(matches!(err, CoreError::OutboundNotFound(_)));
    }

    #[test]
    fn test_toggle_without_config_fails() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));

        let err = store
            .toggle_outbound(&OutboundToggle::new(selector("A"), true))
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingConfiguration(_)));
    }
}
