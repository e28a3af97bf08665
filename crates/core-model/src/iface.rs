//! Interface definitions and deterministic device naming (§3, §4.10).

use crate::error::{ModelError, ModelResult};
use ipnetwork::{Ipv4Network, Ipv6Network};
use serde::{Deserialize, Serialize};

/// Linux device names are capped at `IFNAMSIZ - 1` = 15 characters.
pub const MAX_DEVICE_NAME_LEN: usize = 15;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Interface {
    pub id: u32,
    pub node_id: u32,
    pub name: String,
    pub mac: Option<[u8; 6]>,
    pub ipv4: Vec<Ipv4Network>,
    pub ipv6: Vec<Ipv6Network>,
    pub mtu: u32,
    pub network_id: Option<u32>,
    pub flow_id: Option<u32>,
}

pub const DEFAULT_MTU: u32 = 1500;

impl Interface {
    pub fn new(id: u32, node_id: u32, name: impl Into<String>) -> ModelResult<Self> {
        let name = name.into();
        if name.len() > MAX_DEVICE_NAME_LEN {
            return Err(ModelError::NameTooLong(name));
        }
        Ok(Self {
            id,
            node_id,
            name,
            mac: None,
            ipv4: Vec::new(),
            ipv6: Vec::new(),
            mtu: DEFAULT_MTU,
            network_id: None,
            flow_id: None,
        })
    }

    /// Deterministic default interface name, `eth<id>`, truncating to the
    /// device name limit is never actually required for this scheme since
    /// ids are small integers, but `Interface::new` still enforces it.
    pub fn default_name(id: u32) -> String {
        format!("eth{id}")
    }

    pub fn add_ipv4(&mut self, net: Ipv4Network) {
        self.ipv4.push(net);
    }

    pub fn add_ipv6(&mut self, net: Ipv6Network) {
        self.ipv6.push(net);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_name_is_ethn() {
        assert_eq!(Interface::default_name(0), "eth0");
        assert_eq!(Interface::default_name(12), "eth12");
    }

    #[test]
    fn rejects_overlong_names() {
        let err = Interface::new(0, 1, "this-name-is-way-too-long").unwrap_err();
        assert!(matches!(err, ModelError::NameTooLong(_)));
    }

    #[test]
    fn accepts_name_at_the_limit() {
        let name = "a".repeat(MAX_DEVICE_NAME_LEN);
        assert!(Interface::new(0, 1, name).is_ok());
    }
}
