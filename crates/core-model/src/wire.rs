//! Wire-stable enumerations shared with the (out-of-scope) RPC edge.
//!
//! Numeric values are fixed by §6 of the session engine specification and
//! must never be renumbered — external bindings (gRPC/protobuf, the GUIs)
//! depend on them.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeType {
    Default = 0,
    Physical = 1,
    Switch = 4,
    Hub = 5,
    WirelessLan = 6,
    Rj45 = 7,
    Tunnel = 8,
    Emane = 10,
    TapBridge = 11,
    Container = 15,
    Wireless = 17,
    Podman = 18,
}

impl NodeType {
    /// Network nodes own a network namespace and routing state.
    pub fn is_network_node(self) -> bool {
        matches!(
            self,
            NodeType::Default | NodeType::Container | NodeType::Podman | NodeType::Physical
        )
    }

    /// Link-layer nodes own a host bridge but no namespace.
    pub fn is_link_layer(self) -> bool {
        matches!(
            self,
            NodeType::Switch | NodeType::Hub | NodeType::WirelessLan | NodeType::Wireless
        )
    }

    pub fn is_rj45(self) -> bool {
        matches!(self, NodeType::Rj45)
    }

    pub fn is_tunnel(self) -> bool {
        matches!(self, NodeType::Tunnel)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LinkType {
    Wireless = 0,
    Wired = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SessionState {
    None = 0,
    Definition = 1,
    Configuration = 2,
    Instantiation = 3,
    Runtime = 4,
    Datacollect = 5,
    Shutdown = 6,
}

impl SessionState {
    /// The state one forward step from this one, or `None` at the end of
    /// the line (only `Shutdown` has no forward successor).
    pub fn next(self) -> Option<SessionState> {
        use SessionState::*;
        match self {
            None => Some(Definition),
            Definition => Some(Configuration),
            Configuration => Some(Instantiation),
            Instantiation => Some(Runtime),
            Runtime => Some(Datacollect),
            Datacollect => Some(Shutdown),
            Shutdown => Option::None,
        }
    }

    fn ordinal(self) -> u8 {
        self as u8
    }

    /// True if `target` is a legal transition from `self`: one step
    /// forward, or anywhere into `Shutdown`, or `Shutdown -> Definition`
    /// (reset).
    pub fn can_transition_to(self, target: SessionState) -> bool {
        if target == SessionState::Shutdown {
            return true;
        }
        if self == SessionState::Shutdown && target == SessionState::Definition {
            return true;
        }
        target.ordinal() == self.ordinal() + 1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConfigOptionType {
    None = 0,
    Uint8 = 1,
    Uint16 = 2,
    Uint32 = 3,
    Uint64 = 4,
    Int8 = 5,
    Int16 = 6,
    Int32 = 7,
    Int64 = 8,
    Float = 9,
    String = 10,
    Bool = 11,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum AlertLevel {
    Default = 0,
    Fatal = 1,
    Error = 2,
    Warning = 3,
    Notice = 4,
}
