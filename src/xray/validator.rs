//! Config validation through the core's own self-test
//!
//! Validation is a predicate: every failure mode collapses to `false`.

use super::process::CoreProcess;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Marker xray prints on stdout when a config passes `-test`
pub const CONFIG_OK_MARKER: &str = "Configuration OK";

pub struct ConfigValidator {
    binary: PathBuf,
    default_config: PathBuf,
    process: Arc<dyn CoreProcess>,
}

impl ConfigValidator {
    pub fn new(
        binary: impl Into<PathBuf>,
        default_config: impl Into<PathBuf>,
        process: Arc<dyn CoreProcess>,
    ) -> Self {
        Self {
            binary: binary.into(),
            default_config: default_config.into(),
            process,
        }
    }

    /// Validate the managed config.json
    pub fn validate_default(&self) -> bool {
        self.validate(&self.default_config)
    }

    /// Validate the config at `path`; false without running xray if it is absent
    pub fn validate(&self, path: &Path) -> bool {
        if !path.exists() {
            log::debug!("No config to validate at {}", path.display());
            return false;
        }
        self.test(path)
    }

    /// Run `xray run -test -c <path>` and look for the success marker
    pub fn test(&self, path: &Path) -> bool {
        let args = vec![
            "run".to_string(),
            "-test".to_string(),
            "-c".to_string(),
            path.to_string_lossy().into_owned(),
        ];

        match self.process.self_test(&self.binary, &args) {
            Ok(stdout) => {
                let ok = stdout.contains(CONFIG_OK_MARKER);
                if !ok {
                    log::warn!("xray rejected config {}", path.display());
                }
                ok
            }
            Err(e) => {
                log::warn!("xray config test failed for {}: {}", path.display(), e);
                false
            }
        }
    }
}
