//! Xray core management
//!
//! This module provides the ability to download, configure, and run a
//! local Xray proxy core as a detached child process.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    xray module                           │
//! ├─────────────────────────────────────────────────────────┤
//! │  commands.rs    - Entry points for outer layers          │
//! │  config.rs      - Manager settings and resolved paths    │
//! │  manager.rs     - Process lifecycle (start/stop/restart) │
//! │  process.rs     - OS process capability                  │
//! │  ports.rs       - Inbound port reconciliation            │
//! │  store.rs       - config.json persistence                │
//! │  validator.rs   - `xray run -test` gate                  │
//! │  xray_config.rs - Runtime config types                   │
//! │  provisioner.rs - Release resolution and install         │
//! │  platform.rs    - OS/arch to release naming              │
//! │  downloader.rs  - HTTP download                          │
//! │  hasher.rs      - SHA256 verification                    │
//! │  extractor.rs   - Zip extraction                         │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod config;
pub mod downloader;
pub mod error;
pub mod extractor;
pub mod hasher;
pub mod manager;
pub mod platform;
pub mod ports;
pub mod process;
pub mod provisioner;
pub mod state;
pub mod store;
pub mod validator;
pub mod xray_config;

// Re-export key types for convenience
pub use config::{CorePaths, ManagerSettings};
pub use error::{CoreError, Result};
pub use manager::{CoreManager, PidFileGuard};
pub use provisioner::Provisioner;
pub use state::{CoreStatus, StartOutcome, StopOutcome};
pub use store::ConfigStore;
pub use xray_config::{OutboundToggle, XrayConfig};
