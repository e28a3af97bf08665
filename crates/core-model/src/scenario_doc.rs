//! Scenario documents: the on-disk, serde-friendly form of a session's
//! topology and configuration (§6, §9 Open Question (a); supplemented per
//! SPEC_FULL §11.6).
//!
//! A document round-trips through [`SessionRecord`] without needing a
//! live namespace/fabric driver, so scenarios can be authored, diffed,
//! and version-controlled independently of any running daemon. Older
//! documents may carry a single legacy `range` key directly under a
//! node's config instead of the current WLAN range-model config block;
//! [`ScenarioDocument::upgrade_legacy_range`] migrates those in place.

use crate::config::{ConfigMap, ConfigValue};
use crate::link::{Link, LinkEndpoint, LinkOptions};
use crate::node::{GeoPosition, Node, Position};
use crate::session::SessionRecord;
use crate::wire::{LinkType, NodeType};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeDoc {
    pub id: u32,
    pub name: String,
    pub node_type: NodeType,
    pub position: Position,
    pub geo: Option<GeoPosition>,
    #[serde(default)]
    pub config: ConfigMap,
    /// Names of the session-wide services enabled on this node.
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkDoc {
    pub id: u32,
    pub link_type: LinkType,
    pub node1: LinkEndpoint,
    pub node2: LinkEndpoint,
    pub network_id: Option<u32>,
    #[serde(default)]
    pub options: LinkOptions,
    #[serde(default)]
    pub reverse_options: Option<LinkOptions>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScenarioDocument {
    pub name: String,
    pub description: String,
    pub nodes: Vec<NodeDoc>,
    pub links: Vec<LinkDoc>,
    #[serde(default)]
    pub session_options: ConfigMap,
    #[serde(default)]
    pub metadata: ConfigMap,
}

impl ScenarioDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        let mut doc: ScenarioDocument = serde_json::from_str(s)?;
        doc.upgrade_legacy_range();
        Ok(doc)
    }

    /// Migrate a bare `range` key on a node's config (the legacy scheme,
    /// one flat number meaning "this node's wireless range in meters")
    /// into the current `wlan.range` key used by the range-model engine.
    /// Leaves documents that already use `wlan.range` untouched.
    pub fn upgrade_legacy_range(&mut self) {
        for node in &mut self.nodes {
            if node.config.get("wlan.range").is_some() {
                continue;
            }
            if let Some(legacy) = node.config.get("range").cloned() {
                node.config.set("wlan.range", legacy);
            }
        }
    }

    /// Build a [`SessionRecord`] from this document. The record starts in
    /// `Definition` state; moving it through configuration/instantiation
    /// is the engine layer's job.
    pub fn to_session(&self, session_id: u32, workspace: impl Into<String>) -> SessionRecord {
        let mut session = SessionRecord::new(session_id, workspace);
        session.options = self.session_options.clone();
        for node_doc in &self.nodes {
            let mut node = Node::new(node_doc.id, node_doc.name.clone(), node_doc.node_type)
                .with_position(node_doc.position);
            if let Some(geo) = node_doc.geo {
                node = node.with_geo(geo);
            }
            node.services = node_doc.services.clone();
            session.add_node(node);
        }
        for link_doc in &self.links {
            let mut link = Link::new(link_doc.id, link_doc.link_type, link_doc.node1, link_doc.node2);
            link.network_id = link_doc.network_id;
            link.options = link_doc.options;
            link.reverse_options = link_doc.reverse_options;
            session.add_link(link);
        }
        session
    }

    /// Capture a [`SessionRecord`]'s topology and options back into a
    /// document, preserving node per-node config is left to callers that
    /// track it separately (the record itself doesn't carry per-node
    /// config maps, only the session-wide options).
    pub fn from_session(session: &SessionRecord) -> Self {
        let mut nodes: Vec<NodeDoc> = session
            .nodes
            .values()
            .map(|n| NodeDoc {
                id: n.id,
                name: n.name.clone(),
                node_type: n.node_type,
                position: n.position,
                geo: n.geo,
                config: ConfigMap::new(),
                services: n.services.clone(),
            })
            .collect();
        nodes.sort_by_key(|n| n.id);

        let mut links: Vec<LinkDoc> = session
            .links
            .values()
            .map(|l| LinkDoc {
                id: l.id,
                link_type: l.link_type,
                node1: l.node1,
                node2: l.node2,
                network_id: l.network_id,
                options: l.options,
                reverse_options: l.reverse_options,
            })
            .collect();
        links.sort_by_key(|l| l.id);

        Self {
            name: format!("session-{}", session.id),
            description: String::new(),
            nodes,
            links,
            session_options: session.options.clone(),
            metadata: ConfigMap::new(),
        }
    }
}
