//! Session record (§3): the data held by a single session for its
//! lifetime — topology, configuration, hooks, and distributed-server
//! bindings. State transitions and execution live in the engine layer;
//! this is the data the FSM operates on.

use crate::adjacency::AdjacencyIndex;
use crate::config::ConfigMap;
use crate::hook::Hook;
use crate::ids::IdAllocator;
use crate::link::Link;
use crate::node::{GeoPosition, Node};
use crate::service::Service;
use crate::wire::SessionState;
use std::collections::HashMap;

/// The canvas-to-geographic reference point used to translate node
/// canvas positions into coordinates for the mobility/coordinate-system
/// engine (§4.9).
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferencePoint {
    pub geo: GeoPosition,
    pub scale_meters_per_pixel: f64,
}

/// A distributed session's binding to a peer daemon over a GRE tunnel
/// (§4.11).
#[derive(Clone, Debug)]
pub struct DistributedServer {
    pub name: String,
    pub address: String,
}

pub struct SessionRecord {
    pub id: u32,
    pub state: SessionState,
    pub workspace: String,
    pub user: Option<String>,
    pub options: ConfigMap,
    pub nodes: HashMap<u32, Node>,
    pub links: HashMap<u32, Link>,
    pub services: HashMap<String, Service>,
    pub hooks: Vec<Hook>,
    pub reference_point: ReferencePoint,
    pub distributed_servers: Vec<DistributedServer>,
    pub adjacency: AdjacencyIndex,
    node_ids: IdAllocator,
    link_ids: IdAllocator,
}

impl SessionRecord {
    pub fn new(id: u32, workspace: impl Into<String>) -> Self {
        Self {
            id,
            state: SessionState::Definition,
            workspace: workspace.into(),
            user: None,
            options: ConfigMap::new(),
            nodes: HashMap::new(),
            links: HashMap::new(),
            services: HashMap::new(),
            hooks: Vec::new(),
            reference_point: ReferencePoint::default(),
            distributed_servers: Vec::new(),
            adjacency: AdjacencyIndex::new(),
            node_ids: IdAllocator::new(),
            link_ids: IdAllocator::new(),
        }
    }

    /// Attempt the transition; on success updates `state` and returns the
    /// previous state, on failure leaves `state` untouched.
    pub fn transition_to(&mut self, target: SessionState) -> Result<SessionState, SessionState> {
        if !self.state.can_transition_to(target) {
            return Err(self.state);
        }
        let previous = self.state;
        self.state = target;
        Ok(previous)
    }

    pub fn next_node_id(&mut self) -> u32 {
        self.node_ids.allocate()
    }

    pub fn next_link_id(&mut self) -> u32 {
        self.link_ids.allocate()
    }

    pub fn reserve_node_id(&mut self, id: u32) -> crate::error::ModelResult<()> {
        self.node_ids.reserve(id)
    }

    pub fn reserve_link_id(&mut self, id: u32) -> crate::error::ModelResult<()> {
        self.link_ids.reserve(id)
    }

    pub fn add_node(&mut self, node: Node) {
        self.node_ids.reserve(node.id).ok();
        self.nodes.insert(node.id, node);
    }

    pub fn add_link(&mut self, link: Link) {
        self.link_ids.reserve(link.id).ok();
        self.adjacency.add_link(link.id, link.node1.node_id, link.node2.node_id);
        self.links.insert(link.id, link);
    }

    pub fn remove_link(&mut self, link_id: u32) -> Option<Link> {
        let link = self.links.remove(&link_id)?;
        self.adjacency
            .remove_link(link.id, link.node1.node_id, link.node2.node_id);
        self.link_ids.release(link.id);
        Some(link)
    }

    pub fn hooks_for(&self, state: SessionState) -> impl Iterator<Item = &Hook> {
        self.hooks.iter().filter(move |h| h.state == state)
    }

    /// Resolve `node_id`'s enabled services by name, applying any
    /// per-node override over the session-wide default (§3). A service
    /// name with neither an override nor a session-wide definition is
    /// silently skipped.
    pub fn node_services(&self, node_id: u32) -> HashMap<String, Service> {
        let Some(node) = self.nodes.get(&node_id) else {
            return HashMap::new();
        };
        node.services
            .iter()
            .filter_map(|name| {
                node.service_overrides
                    .get(name)
                    .or_else(|| self.services.get(name))
                    .cloned()
                    .map(|service| (name.clone(), service))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkEndpoint;
    use crate::wire::{LinkType, NodeType};

    #[test]
    fn new_session_starts_in_definition() {
        let session = SessionRecord::new(1, "/tmp/session-1");
        assert_eq!(session.state, SessionState::Definition);
    }

    #[test]
    fn forward_transition_succeeds_and_reports_previous() {
        let mut session = SessionRecord::new(1, "/tmp/session-1");
        let previous = session.transition_to(SessionState::Configuration).unwrap();
        assert_eq!(previous, SessionState::Definition);
        assert_eq!(session.state, SessionState::Configuration);
    }

    #[test]
    fn invalid_transition_leaves_state_untouched() {
        let mut session = SessionRecord::new(1, "/tmp/session-1");
        assert!(session.transition_to(SessionState::Runtime).is_err());
        assert_eq!(session.state, SessionState::Definition);
    }

    #[test]
    fn adding_and_removing_links_updates_adjacency() {
        let mut session = SessionRecord::new(1, "/tmp/session-1");
        session.add_node(Node::new(1, "n1", NodeType::Default));
        session.add_node(Node::new(2, "n2", NodeType::Default));
        let link = Link::new(
            1,
            LinkType::Wired,
            LinkEndpoint::new(1, Some(0)),
            LinkEndpoint::new(2, Some(0)),
        );
        session.add_link(link);
        assert_eq!(session.adjacency.incident_links(1).count(), 1);
        session.remove_link(1);
        assert_eq!(session.adjacency.incident_links(1).count(), 0);
    }

    #[test]
    fn node_services_resolves_enabled_subset_with_overrides() {
        let mut session = SessionRecord::new(1, "/tmp/session-1");
        session.services.insert("A".to_string(), Service::new("A"));
        session.services.insert("B".to_string(), Service::new("B"));
        session.services.insert("C".to_string(), Service::new("C"));

        let mut override_b = Service::new("B");
        override_b.startup.push(crate::service::ServiceCommand::blocking("custom"));
        let node = Node::new(1, "n1", NodeType::Default)
            .with_service("A")
            .with_service_override(override_b);
        session.add_node(node);

        let resolved = session.node_services(1);
        assert_eq!(resolved.len(), 2);
        assert!(!resolved["B"].startup.is_empty());
        assert!(!resolved.contains_key("C"));
    }

    #[test]
    fn hooks_for_filters_by_state() {
        let mut session = SessionRecord::new(1, "/tmp/session-1");
        session
            .hooks
            .push(Hook::new(SessionState::Runtime, "h1", "echo hi"));
        session
            .hooks
            .push(Hook::new(SessionState::Shutdown, "h2", "echo bye"));
        assert_eq!(session.hooks_for(SessionState::Runtime).count(), 1);
    }
}
