//! Data model for the CORE session engine: sessions, nodes, links,
//! services, hooks, configuration, and identifier/address allocation.
//!
//! This crate holds no I/O and no namespace/netlink code — it is the
//! shared vocabulary that `core-netns` (the namespace/fabric driver) and
//! `core-engine` (the FSM, scheduler, and supporting engines) both build
//! on.

pub mod adjacency;
pub mod alert;
pub mod config;
pub mod error;
pub mod hook;
pub mod ids;
pub mod iface;
pub mod link;
pub mod node;
pub mod scenario_doc;
pub mod service;
pub mod session;
pub mod wire;

pub use adjacency::AdjacencyIndex;
pub use alert::{Alert, AlertLog};
pub use config::{ConfigMap, ConfigSchema, ConfigValue};
pub use error::{ModelError, ModelResult};
pub use hook::Hook;
pub use ids::{format_mac, IdAllocator, Ipv4Pool, Ipv4Subnet, Ipv6Pool, MacAllocator};
pub use iface::Interface;
pub use link::{Link, LinkEndpoint, LinkOptions};
pub use node::{GeoPosition, Node, Position};
pub use scenario_doc::ScenarioDocument;
pub use service::{Service, ServiceCommand};
pub use session::SessionRecord;
pub use wire::{AlertLevel, ConfigOptionType, LinkType, NodeType, SessionState};
