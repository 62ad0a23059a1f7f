//! xray-manager
//!
//! Provisions, configures and supervises a locally installed Xray proxy
//! core. See [`xray`] for the components.

pub mod logging;
pub mod xray;
