//! Xray runtime configuration types
//!
//! Only the fields the manager reasons about are typed. Everything else
//! (protocol settings, stream settings, routing, dns, ...) is carried
//! through untouched so a read/write cycle never drops user data.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Top-level config.json consumed by `xray run -c`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct XrayConfig {
    #[serde(default)]
    pub inbounds: Vec<Inbound>,

    #[serde(default)]
    pub outbounds: Vec<Outbound>,

    /// Remaining sections (log, routing, dns, policy, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A listener accepting client connections
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Inbound {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,

    /// Number, numeric string, range ("1000-2000") or "env:NAME"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Inbound {
    /// The single port this inbound listens on, if it names exactly one
    pub fn port_number(&self) -> Option<u16> {
        let port = match self.port.as_ref()? {
            Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            Value::String(s) => s.trim().parse::<u16>().ok(),
            _ => None,
        };
        port.filter(|port| *port != 0)
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = Some(Value::from(port));
    }
}

/// An upstream the core can route traffic through
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Outbound {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(default)]
    pub enabled: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Request to enable or disable one outbound
///
/// Every field other than `enabled` identifies the target outbound, e.g.
/// `{"name": "A", "enabled": true}` or `{"tag": "proxy", "enabled": false}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundToggle {
    pub enabled: bool,

    #[serde(flatten)]
    pub selector: Map<String, Value>,
}

impl OutboundToggle {
    pub fn new(selector: Map<String, Value>, enabled: bool) -> Self {
        Self { enabled, selector }
    }

    /// Whether `outbound` carries every identifying field of this request
    pub fn matches(&self, outbound: &Outbound) -> bool {
        if self.selector.is_empty() {
            return false;
        }
        let Ok(Value::Object(fields)) = serde_json::to_value(outbound) else {
            return false;
        };
        self.selector
            .iter()
            .filter(|(key, _)| key.as_str() != "enabled")
            .all(|(key, expected)| fields.get(key) == Some(expected))
    }

    /// Human-readable selector for log and error messages
    pub fn describe(&self) -> String {
        Value::Object(self.selector.clone()).to_string()
    }
}

impl XrayConfig {
    /// Port of the first inbound, the one subject to reconciliation
    pub fn first_inbound_port(&self) -> Option<u16> {
        self.inbounds.first().and_then(Inbound::port_number)
    }

    /// Built-in configuration used when nothing valid is on disk
    pub fn default_config() -> Self {
        let mut extra = Map::new();
        extra.insert("log".to_string(), json!({ "loglevel": "warning" }));

        let mut socks = Map::new();
        socks.insert("settings".to_string(), json!({ "auth": "noauth", "udp": true }));
        socks.insert(
            "sniffing".to_string(),
            json!({ "enabled": true, "destOverride": ["http", "tls"] }),
        );

        Self {
            inbounds: vec![Inbound {
                tag: Some("socks-in".to_string()),
                listen: Some("127.0.0.1".to_string()),
                port: Some(Value::from(1080)),
                protocol: Some("socks".to_string()),
                extra: socks,
            }],
            outbounds: vec![
                Outbound {
                    name: Some("direct".to_string()),
                    tag: Some("direct".to_string()),
                    protocol: Some("freedom".to_string()),
                    enabled: true,
                    extra: Map::new(),
                },
                Outbound {
                    name: Some("block".to_string()),
                    tag: Some("block".to_string()),
                    protocol: Some("blackhole".to_string()),
                    enabled: false,
                    extra: Map::new(),
                },
            ],
            extra,
        }
    }
}
