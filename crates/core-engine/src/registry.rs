//! Session registry (§2, §11.2): owns every live session behind an
//! explicit command-channel actor (`SessionHandle`) instead of a
//! process-global table, so the daemon constructs and threads a
//! `SessionRegistry` value rather than reaching for a `static`.

use crate::error::{EngineError, EngineResult};
use crate::fsm::SessionFsm;
use crate::runtime::SessionRuntime;
use core_model::{SessionRecord, SessionState};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// A cheap, cloneable view of a session's topology size and state,
/// suitable for `session list` without round-tripping the whole record.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub id: u32,
    pub state: SessionState,
    pub workspace: String,
    pub node_count: usize,
    pub link_count: usize,
}

enum Command {
    Transition(SessionState, oneshot::Sender<EngineResult<SessionState>>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    AddNode(core_model::Node, oneshot::Sender<()>),
    AddLink(core_model::Link, oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

const COMMAND_QUEUE_CAPACITY: usize = 64;

async fn run_actor(mut session: SessionRecord, mut rx: mpsc::Receiver<Command>) {
    let mut runtime = match SessionRuntime::new().await {
        Ok(rt) => Some(rt),
        Err(e) => {
            warn!("session {} could not build its runtime: {}", session.id, e);
            None
        }
    };

    while let Some(command) = rx.recv().await {
        match command {
            Command::Transition(target, reply) => {
                let result = match runtime.as_mut() {
                    Some(rt) => SessionFsm::transition(&mut session, target, rt).await.map(|_| session.state),
                    None => Err(EngineError::InvalidConfig(format!(
                        "session {} has no runtime, cannot transition",
                        session.id
                    ))),
                };
                let _ = reply.send(result);
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(SessionSnapshot {
                    id: session.id,
                    state: session.state,
                    workspace: session.workspace.clone(),
                    node_count: session.nodes.len(),
                    link_count: session.links.len(),
                });
            }
            Command::AddNode(node, reply) => {
                session.add_node(node);
                let _ = reply.send(());
            }
            Command::AddLink(link, reply) => {
                session.add_link(link);
                let _ = reply.send(());
            }
            Command::Shutdown(reply) => {
                let _ = reply.send(());
                break;
            }
        }
    }
}

/// A handle to a running session actor. Cloning a handle is cheap — it's
/// just another sender onto the same command channel.
#[derive(Clone)]
pub struct SessionHandle {
    id: u32,
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub async fn transition(&self, target: SessionState) -> EngineResult<SessionState> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Transition(target, reply_tx)).await?;
        reply_rx.await.map_err(channel_closed)?
    }

    pub async fn snapshot(&self) -> EngineResult<SessionSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Snapshot(reply_tx)).await?;
        reply_rx.await.map_err(channel_closed)
    }

    pub async fn add_node(&self, node: core_model::Node) -> EngineResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::AddNode(node, reply_tx)).await?;
        reply_rx.await.map_err(channel_closed)
    }

    pub async fn add_link(&self, link: core_model::Link) -> EngineResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::AddLink(link, reply_tx)).await?;
        reply_rx.await.map_err(channel_closed)
    }

    pub async fn shutdown(&self) -> EngineResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Shutdown(reply_tx)).await?;
        reply_rx.await.map_err(channel_closed)
    }

    async fn send(&self, command: Command) -> EngineResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| EngineError::Io(std::io::Error::other("session actor is gone")))
    }
}

fn channel_closed(_: oneshot::error::RecvError) -> EngineError {
    EngineError::Io(std::io::Error::other("session actor closed the reply channel"))
}

/// Owns every live session's actor handle. Constructed explicitly by the
/// daemon; never a global.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<u32, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// Spawn a new session actor wrapping a fresh record, and register it.
    pub fn create(&mut self, id: u32, workspace: impl Into<String>) -> SessionHandle {
        let session = SessionRecord::new(id, workspace);
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        tokio::spawn(run_actor(session, rx));
        let handle = SessionHandle { id, tx };
        self.sessions.insert(id, handle.clone());
        handle
    }

    pub fn get(&self, id: u32) -> Option<SessionHandle> {
        self.sessions.get(&id).cloned()
    }

    pub fn remove(&mut self, id: u32) -> Option<SessionHandle> {
        self.sessions.remove(&id)
    }

    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_registers_and_returns_a_working_handle() {
        let mut registry = SessionRegistry::new();
        let handle = registry.create(1, "/tmp/session-1");
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.id, 1);
        assert_eq!(snapshot.state, SessionState::Definition);
        assert_eq!(registry.ids(), vec![1]);
    }

    #[tokio::test]
    async fn transition_through_the_handle_updates_state() {
        let mut registry = SessionRegistry::new();
        let handle = registry.create(1, "/tmp/session-1");
        let state = handle.transition(SessionState::Configuration).await.unwrap();
        assert_eq!(state, SessionState::Configuration);
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state, SessionState::Configuration);
    }

    #[tokio::test]
    async fn invalid_transition_through_the_handle_is_rejected() {
        let mut registry = SessionRegistry::new();
        let handle = registry.create(1, "/tmp/session-1");
        assert!(handle.transition(SessionState::Runtime).await.is_err());
    }

    #[tokio::test]
    async fn add_node_is_reflected_in_snapshot() {
        let mut registry = SessionRegistry::new();
        let handle = registry.create(1, "/tmp/session-1");
        handle
            .add_node(core_model::Node::new(1, "n1", core_model::wire::NodeType::Default))
            .await
            .unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.node_count, 1);
    }

    #[tokio::test]
    async fn remove_drops_the_registry_entry() {
        let mut registry = SessionRegistry::new();
        registry.create(1, "/tmp/session-1");
        assert!(registry.remove(1).is_some());
        assert!(registry.get(1).is_none());
    }
}
