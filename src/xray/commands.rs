//! Command handlers for the core
//!
//! Thin entry points for an outer layer (the CLI here, or an HTTP route
//! handler). Each one does a single lifecycle or config operation.

use super::config::ManagerSettings;
use super::error::Result;
use super::manager::CoreManager;
use super::provisioner::Provisioner;
use super::state::{CoreStatus, StartOutcome, StopOutcome};
use super::xray_config::{OutboundToggle, XrayConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Empty acknowledgment returned by mutating endpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {}

// ============================================================================
// Status & Configuration Commands
// ============================================================================

/// Get the current core status
pub fn get_core_status(manager: &CoreManager) -> CoreStatus {
    manager.status()
}

/// Get the stored core config
pub fn get_core_config(manager: &CoreManager) -> Option<XrayConfig> {
    manager.store().read()
}

/// Enable or disable one outbound (PATCH /outbounds)
pub fn patch_outbound(manager: &CoreManager, toggle: OutboundToggle) -> Result<Ack> {
    if toggle.enabled {
        manager.store().enable_outbound(&toggle)?;
    } else {
        manager.store().disable_outbound(&toggle)?;
    }
    Ok(Ack {})
}

/// Replace the core config with the built-in default
pub fn reset_core_config(manager: &CoreManager) -> Result<Ack> {
    manager.store().write_default()?;
    Ok(Ack {})
}

/// Validate a config file, defaulting to the managed one
pub fn validate_core_config(manager: &CoreManager, path: Option<&Path>) -> bool {
    match path {
        Some(path) => manager.validator().validate(path),
        None => manager.validator().validate_default(),
    }
}

// ============================================================================
// Process Management Commands
// ============================================================================

/// Start the core
pub fn start_core(manager: &CoreManager) -> Result<StartOutcome> {
    manager.start()
}

/// Stop the core
pub fn stop_core(manager: &CoreManager) -> Result<StopOutcome> {
    manager.stop()
}

/// Restart the core
pub fn restart_core(manager: &CoreManager) -> Result<(StopOutcome, StartOutcome)> {
    manager.restart()
}

// ============================================================================
// Install Commands
// ============================================================================

/// Download and install the configured core release
pub async fn install_core(manager: &CoreManager, settings: &ManagerSettings) -> Result<PathBuf> {
    Provisioner::new(manager.paths().clone()).install(settings).await
}

/// Check whether the core binary is installed
pub fn is_core_installed(manager: &CoreManager) -> bool {
    Provisioner::new(manager.paths().clone()).binary_exists()
}
