//! Outcome and status types for the managed core

use serde::{Deserialize, Serialize};

/// Result of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "pid", rename_all = "camelCase")]
pub enum StartOutcome {
    /// xray was launched with this pid
    Started(u32),
    /// No usable config even after falling back to the default
    SkippedNoConfig,
    /// Config has no first inbound with a port
    SkippedNoInbound,
}

impl StartOutcome {
    pub fn pid(&self) -> Option<u32> {
        match self {
            StartOutcome::Started(pid) => Some(*pid),
            _ => None,
        }
    }
}

/// Result of a stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "pid", rename_all = "camelCase")]
pub enum StopOutcome {
    /// No PID file on disk; nothing has been started from here
    NotTracked,
    /// PID file exists but holds no usable pid
    Empty,
    /// Recorded process is already gone; no signal sent
    Stale(u32),
    /// Termination signal delivered
    Signalled(u32),
}

/// Snapshot of the managed core (for display and health checks)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CoreStatus {
    /// Whether the xray binary exists
    pub installed: bool,

    /// Whether a readable config.json exists
    pub configured: bool,

    /// Whether the recorded process is alive
    pub running: bool,

    /// Recorded process id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    /// First inbound port of the current config
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Path to the xray binary
    pub binary: String,

    /// Path to config.json
    pub config: String,
}
