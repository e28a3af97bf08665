//! Error types for the engine layer: the FSM, scheduler, range model,
//! mobility, coordinate system, event bus, and distributed broker each
//! define focused errors that aggregate here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("model error: {0}")]
    Model(#[from] core_model::ModelError),

    #[error("fabric error: {0}")]
    Fabric(#[from] core_netns::FabricError),

    #[error("invalid session state transition: {0:?} -> {1:?}")]
    InvalidTransition(core_model::SessionState, core_model::SessionState),

    #[error("hook '{0}' timed out after {1:?}")]
    HookTimeout(String, std::time::Duration),

    #[error("service dependency cycle detected among: {0:?}")]
    ServiceDependencyCycle(Vec<String>),

    #[error("service '{0}' depends on unknown service '{1}'")]
    UnknownServiceDependency(String, String),

    #[error("service '{0}' failed validation after {1} attempts")]
    ServiceValidationFailed(String, u32),

    #[error("coordinate conversion failed: {0}")]
    CoordinateConversion(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("peer daemon '{0}' unreachable")]
    PeerUnreachable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
