//! Session state machine (§4.1): validates a state transition, performs
//! that state's component-specific work against the live
//! [`SessionRuntime`], then runs any hooks registered for the target
//! state.
//!
//! Component work runs before hooks and is the thing that actually wires
//! namespaces, veths, impairments, and services into existence — hooks
//! are user scripts layered on top, never a substitute for it. If
//! component work fails the session is force-transitioned to `Shutdown`
//! and a fatal alert is published; the failure never reaches the
//! caller's `Result` directly; only the alert surfaces it; so a single
//! bad node definition can't strand a session half-instantiated.
//!
//! Hooks run as subprocesses with `SESSION`, `SESSION_DIR`, and
//! `SESSION_USER` set in their environment, capped at a 30 second
//! timeout. A hook's exit code is logged but never blocks the
//! transition — a broken hook script is a misconfiguration to surface,
//! not a reason to strand a session mid-transition.

use crate::bus::Topic;
use crate::error::{EngineError, EngineResult};
use crate::runtime::{SessionRuntime, DEFAULT_WLAN_RANGE};
use crate::scheduler::{order_services, ServiceRunner};
use crate::{MobilityTrack, RangeModel, ThroughputSampler};
use core_model::{Hook, Interface, Link, Node, SessionRecord, SessionState};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

pub const HOOK_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SessionFsm;

impl SessionFsm {
    /// Attempt to move `session` to `target`, performing that state's
    /// component work against `runtime` and then running any hooks
    /// registered for `target`.
    pub async fn transition(
        session: &mut SessionRecord,
        target: SessionState,
        runtime: &mut SessionRuntime,
    ) -> EngineResult<()> {
        session
            .transition_to(target)
            .map_err(|current| EngineError::InvalidTransition(current, target))?;

        if let Err(e) = Self::run_component_work(session, runtime, target).await {
            warn!("component work entering {:?} failed: {}", target, e);
            runtime.publish(
                Topic::Alert,
                format!("session {} failed entering {:?}: {}", session.id, target, e),
            );
            if session.transition_to(SessionState::Shutdown).is_ok() {
                let _ = Self::run_component_work(session, runtime, SessionState::Shutdown).await;
            }
            return Ok(());
        }

        let hooks: Vec<Hook> = session.hooks_for(target).cloned().collect();
        for hook in hooks {
            Self::run_hook(session, &hook).await;
        }
        Ok(())
    }

    /// A lightweight transition check for callers (scenario validation)
    /// that want the FSM's rules enforced without a live runtime. Never
    /// touches the fabric, never runs hooks.
    pub fn validate_transition(session: &mut SessionRecord, target: SessionState) -> EngineResult<()> {
        session
            .transition_to(target)
            .map_err(|current| EngineError::InvalidTransition(current, target))?;
        if target == SessionState::Configuration {
            order_services(&session.services)?;
        }
        Ok(())
    }

    async fn run_component_work(
        session: &SessionRecord,
        runtime: &mut SessionRuntime,
        target: SessionState,
    ) -> EngineResult<()> {
        match target {
            SessionState::Configuration => Self::enter_configuration(session),
            SessionState::Instantiation => Self::enter_instantiation(session, runtime).await,
            SessionState::Runtime => Self::enter_runtime(session, runtime),
            SessionState::Datacollect => Self::enter_datacollect(session, runtime).await,
            SessionState::Shutdown => Self::enter_shutdown(session, runtime).await,
            SessionState::Definition | SessionState::None => Ok(()),
        }
    }

    /// Validate the session's service dependency graph before anything
    /// gets instantiated against it.
    fn enter_configuration(session: &SessionRecord) -> EngineResult<()> {
        order_services(&session.services)?;
        Ok(())
    }

    /// Create every node's namespace, wire every link, then start each
    /// node's enabled services.
    async fn enter_instantiation(session: &SessionRecord, runtime: &mut SessionRuntime) -> EngineResult<()> {
        let mut nodes: Vec<&Node> = session.nodes.values().collect();
        nodes.sort_by_key(|n| n.id);
        for node in &nodes {
            runtime.fabric.instantiate_node(node.id, node.node_type).await?;
        }

        let mut links: Vec<&Link> = session.links.values().collect();
        links.sort_by_key(|l| l.id);
        for link in &links {
            let (Some(node1), Some(node2)) =
                (session.nodes.get(&link.node1.node_id), session.nodes.get(&link.node2.node_id))
            else {
                continue;
            };
            Self::wire_link(runtime, node1, node2, link).await?;
        }

        for node in &nodes {
            let services = session.node_services(node.id);
            ServiceRunner::start_all(&runtime.fabric, node.id, &services).await?;
        }
        Ok(())
    }

    async fn wire_link(runtime: &mut SessionRuntime, node1: &Node, node2: &Node, link: &Link) -> EngineResult<()> {
        let options = &link.options;
        let node2_options = link.node2_options();

        if node1.node_type.is_link_layer() && !node2.node_type.is_link_layer() {
            let iface = default_interface(node2.id, link.node2.iface_id)?;
            runtime.fabric.attach_to_network_node(node2.id, &iface, node1.id, node2_options).await?;
        } else if node2.node_type.is_link_layer() && !node1.node_type.is_link_layer() {
            let iface = default_interface(node1.id, link.node1.iface_id)?;
            runtime.fabric.attach_to_network_node(node1.id, &iface, node2.id, options).await?;
        } else {
            let iface1 = default_interface(node1.id, link.node1.iface_id)?;
            let iface2 = default_interface(node2.id, link.node2.iface_id)?;
            runtime
                .fabric
                .instantiate_wired_link(node1.id, &iface1, node2.id, &iface2, options, node2_options)
                .await?;
        }
        Ok(())
    }

    /// Seed per-node mobility/throughput tracking, and a range model for
    /// every WLAN/wireless network node, from the topology as it stands
    /// right now.
    fn enter_runtime(session: &SessionRecord, runtime: &mut SessionRuntime) -> EngineResult<()> {
        for node in session.nodes.values() {
            runtime.mobility.insert(node.id, MobilityTrack::new(node.position));
            runtime.throughput.insert(node.id, ThroughputSampler::new());

            if node.node_type.is_link_layer() {
                let mut model = RangeModel::new(DEFAULT_WLAN_RANGE);
                for member_id in network_members(session, node.id) {
                    if let Some(member) = session.nodes.get(&member_id) {
                        model.update_position(member.id, member.position);
                    }
                }
                runtime.range_models.insert(node.id, model);
            }
        }
        runtime.publish(Topic::Session, format!("session {} entered Runtime", session.id));
        Ok(())
    }

    async fn enter_datacollect(session: &SessionRecord, runtime: &mut SessionRuntime) -> EngineResult<()> {
        for node in session.nodes.values() {
            let services = session.node_services(node.id);
            ServiceRunner::shutdown_all(&runtime.fabric, node.id, &services).await?;
        }
        runtime.publish(Topic::Session, format!("session {} entered Datacollect", session.id));
        Ok(())
    }

    /// Best-effort teardown: a single node failing to destroy cleanly
    /// shouldn't stop the rest of the session from shutting down.
    async fn enter_shutdown(session: &SessionRecord, runtime: &mut SessionRuntime) -> EngineResult<()> {
        for node in session.nodes.values() {
            if let Err(e) = runtime.fabric.destroy_node(node.id).await {
                warn!("failed to destroy node {} during shutdown: {}", node.id, e);
            }
        }
        runtime.clear_node_state();
        runtime.publish(Topic::Session, format!("session {} entered Shutdown", session.id));
        Ok(())
    }

    async fn run_hook(session: &SessionRecord, hook: &Hook) {
        debug!("running hook '{}' for state {:?}", hook.name, hook.state);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&hook.body)
            .env("SESSION", session.id.to_string())
            .env("SESSION_DIR", &session.workspace)
            .env("SESSION_USER", session.user.as_deref().unwrap_or(""));

        match timeout(HOOK_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => {
                if !output.status.success() {
                    warn!(
                        "hook '{}' exited with {:?}: {}",
                        hook.name,
                        output.status.code(),
                        String::from_utf8_lossy(&output.stderr)
                    );
                }
            }
            Ok(Err(e)) => warn!("hook '{}' failed to launch: {}", hook.name, e),
            Err(_) => warn!("hook '{}' timed out after {:?}", hook.name, HOOK_TIMEOUT),
        }
    }
}

/// Synthesize a minimal interface record for a link endpoint. `SessionRecord`
/// doesn't persist `Interface` data of its own (no address pool exists yet,
/// see DESIGN.md), so instantiation always wires with default MTU and no
/// addresses assigned.
fn default_interface(node_id: u32, iface_id: Option<u32>) -> EngineResult<Interface> {
    let id = iface_id.unwrap_or(0);
    Interface::new(id, node_id, Interface::default_name(id)).map_err(EngineError::Model)
}

/// Every other node directly linked to `network_node_id` (a link-layer
/// node's bridge members).
fn network_members(session: &SessionRecord, network_node_id: u32) -> Vec<u32> {
    session
        .links
        .values()
        .filter_map(|link| {
            if link.node1.node_id == network_node_id {
                Some(link.node2.node_id)
            } else if link.node2.node_id == network_node_id {
                Some(link.node1.node_id)
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::wire::SessionState::*;

    fn session() -> SessionRecord {
        SessionRecord::new(1, "/tmp/session-1")
    }

    async fn runtime() -> SessionRuntime {
        SessionRuntime::new().await.unwrap()
    }

    #[tokio::test]
    async fn transition_runs_hooks_for_target_state() {
        let mut session = session();
        let mut rt = runtime().await;
        session.hooks.push(Hook::new(Configuration, "noop", "exit 0"));
        SessionFsm::transition(&mut session, Configuration, &mut rt).await.unwrap();
        assert_eq!(session.state, Configuration);
    }

    #[tokio::test]
    async fn invalid_transition_is_rejected_and_state_unchanged() {
        let mut session = session();
        let mut rt = runtime().await;
        let err = SessionFsm::transition(&mut session, Runtime, &mut rt).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition(Definition, Runtime)));
        assert_eq!(session.state, Definition);
    }

    #[tokio::test]
    async fn failing_hook_does_not_block_transition() {
        let mut session = session();
        let mut rt = runtime().await;
        session.hooks.push(Hook::new(Configuration, "fails", "exit 1"));
        assert!(SessionFsm::transition(&mut session, Configuration, &mut rt).await.is_ok());
        assert_eq!(session.state, Configuration);
    }

    #[tokio::test]
    async fn shutdown_reachable_and_resets() {
        let mut session = session();
        let mut rt = runtime().await;
        SessionFsm::transition(&mut session, Shutdown, &mut rt).await.unwrap();
        assert_eq!(session.state, Shutdown);
        SessionFsm::transition(&mut session, Definition, &mut rt).await.unwrap();
        assert_eq!(session.state, Definition);
    }

    #[test]
    fn validate_transition_rejects_a_service_dependency_cycle() {
        let mut session = session();
        let mut a = core_model::Service::new("a");
        a = a.depends_on("b");
        let mut b = core_model::Service::new("b");
        b = b.depends_on("a");
        session.services.insert("a".to_string(), a);
        session.services.insert("b".to_string(), b);

        let err = SessionFsm::validate_transition(&mut session, Configuration).unwrap_err();
        assert!(matches!(err, EngineError::ServiceDependencyCycle(_)));
    }

    #[test]
    fn validate_transition_never_touches_state_on_invalid_target() {
        let mut session = session();
        assert!(SessionFsm::validate_transition(&mut session, Runtime).is_err());
        assert_eq!(session.state, Definition);
    }

    #[tokio::test]
    #[cfg(feature = "sudo-tests")]
    async fn instantiation_creates_namespaces_and_shutdown_tears_them_down() {
        let mut session = session();
        session.add_node(core_model::Node::new(1, "n1", core_model::wire::NodeType::Default));
        session.add_node(core_model::Node::new(2, "n2", core_model::wire::NodeType::Default));
        session.add_link(Link::new(
            1,
            core_model::wire::LinkType::Wired,
            core_model::LinkEndpoint::new(1, Some(0)),
            core_model::LinkEndpoint::new(2, Some(0)),
        ));

        let mut rt = runtime().await;
        SessionFsm::transition(&mut session, Configuration, &mut rt).await.unwrap();
        SessionFsm::transition(&mut session, Instantiation, &mut rt).await.unwrap();
        assert_eq!(session.state, Instantiation);

        SessionFsm::transition(&mut session, Runtime, &mut rt).await.unwrap();
        assert_eq!(rt.mobility.len(), 2);

        SessionFsm::transition(&mut session, Datacollect, &mut rt).await.unwrap();
        SessionFsm::transition(&mut session, Shutdown, &mut rt).await.unwrap();
        assert_eq!(session.state, Shutdown);
        assert!(rt.mobility.is_empty());
    }
}
