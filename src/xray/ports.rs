//! Inbound port reconciliation
//!
//! Before launch, the first inbound's port is checked on the host. If
//! something else holds it, a free ephemeral port is picked and persisted.
//! Another process can still take the port before xray binds it; xray
//! then fails to start and says so.

use super::error::{CoreError, Result};
use super::store::ConfigStore;
use super::xray_config::XrayConfig;
use std::net::{Ipv4Addr, TcpListener};

/// How many OS-assigned ports are tried before giving up
const MAX_PORT_ATTEMPTS: usize = 16;

/// What reconciliation did to the config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortOutcome {
    /// Configured port was free; config untouched
    Unchanged(u16),
    /// Configured port was taken and has been replaced
    Reassigned { from: u16, to: u16 },
    /// Config has no first inbound port to check
    NoInbound,
}

/// Whether a TCP listener could bind `port` on all and loopback interfaces
pub fn is_port_available(port: u16) -> bool {
    [Ipv4Addr::UNSPECIFIED, Ipv4Addr::LOCALHOST]
        .iter()
        .all(|addr| TcpListener::bind((*addr, port)).is_ok())
}

/// Ask the OS for a currently unused port
pub fn free_port() -> Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}

/// Make sure the first inbound's port is free, rewriting the config if not
pub fn reconcile(config: &mut XrayConfig, store: &ConfigStore) -> Result<PortOutcome> {
    let Some(port) = config.first_inbound_port() else {
        return Ok(PortOutcome::NoInbound);
    };

    if is_port_available(port) {
        return Ok(PortOutcome::Unchanged(port));
    }

    let replacement = find_replacement(port, is_port_available)?;

    if let Some(inbound) = config.inbounds.first_mut() {
        inbound.set_port(replacement);
    }
    store.write(config)?;

    log::warn!(
        "Inbound port {} is in use, switched to {}",
        port,
        replacement
    );
    Ok(PortOutcome::Reassigned {
        from: port,
        to: replacement,
    })
}

/// Pick an OS-assigned port other than `taken` that `available` accepts
fn find_replacement(taken: u16, available: impl Fn(u16) -> bool) -> Result<u16> {
    for _ in 0..MAX_PORT_ATTEMPTS {
        let candidate = free_port()?;
        if candidate != taken && available(candidate) {
            return Ok(candidate);
        }
    }
    Err(CoreError::NoFreePort {
        port: taken,
        attempts: MAX_PORT_ATTEMPTS,
    })
}
