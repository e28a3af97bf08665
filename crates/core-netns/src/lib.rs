//! Linux namespace and fabric driver for the session engine (§4.2, §4.3,
//! §4.4).
//!
//! This crate is the only one in the workspace that touches namespaces,
//! netlink, and `tc`. It creates one network namespace per network node,
//! wires wired links with veth pairs and link-layer nodes with Linux
//! bridges, assigns the addresses [`core_model`] hands out, and applies
//! each link's impairment options via `tc netem`.

pub mod addr;
pub mod fabric;
pub mod netns;
pub mod qdisc;
pub mod veth;

pub use fabric::Fabric;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FabricError {
    #[error("network namespace error: {0}")]
    NetNs(#[from] netns::NetNsError),

    #[error("veth/bridge interface error: {0}")]
    Veth(#[from] veth::VethError),

    #[error("address configuration error: {0}")]
    Addr(#[from] addr::AddrError),

    #[error("qdisc configuration error: {0}")]
    Qdisc(#[from] qdisc::QdiscError),

    #[error("model error: {0}")]
    Model(#[from] core_model::ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("netlink error: {0}")]
    Netlink(#[from] rtnetlink::Error),

    #[error("system call error: {0}")]
    Nix(#[from] nix::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
