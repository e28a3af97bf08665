//! Error kinds surfaced by the data model layer.
//!
//! These map directly onto the RPC-facing error kinds in the session engine
//! specification (session/node/link lookups, id collisions, malformed
//! addresses, unsupported node types). Namespace/fabric/scheduler layers
//! define their own error enums and convert into `core_engine::Error`
//! further up the stack.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("session {0} not found")]
    SessionNotFound(u32),

    #[error("node {0} not found")]
    NodeNotFound(u32),

    #[error("link between ({0}, {1:?}) and ({2}, {3:?}) not found")]
    LinkNotFound(u32, Option<u32>, u32, Option<u32>),

    #[error("interface {1} not found on node {0}")]
    InterfaceNotFound(u32, u32),

    #[error("duplicate id: {0}")]
    DuplicateId(u32),

    #[error("name '{0}' exceeds the 15-character device name limit")]
    NameTooLong(String),

    #[error("malformed address: {0}")]
    BadAddress(String),

    #[error("unsupported node type: {0:?}")]
    UnsupportedNodeType(crate::wire::NodeType),

    #[error("a wired link already exists between ({0}, {1}) and ({2}, {3})")]
    DuplicateLink(u32, u32, u32, u32),

    #[error("address pool exhausted")]
    PoolExhausted,

    #[error("config subject '{0}' has no schema entry for key '{1}'")]
    UnknownConfigKey(String, String),

    #[error("config value for '{0}' does not match the declared type {1:?}")]
    ConfigTypeMismatch(String, crate::wire::ConfigOptionType),
}

pub type ModelResult<T> = Result<T, ModelError>;
