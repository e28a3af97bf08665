//! Node definitions (§3, §4.9).

use crate::service::Service;
use crate::wire::NodeType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canvas position in session-local coordinates (pixels by convention,
/// but the unit is opaque to the model layer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Geographic position (WGS84-ish, altitude in meters).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

impl GeoPosition {
    pub fn new(lat: f64, lon: f64, alt: f64) -> Self {
        Self { lat, lon, alt }
    }
}

/// A node in a session's topology. Network nodes (§wire::NodeType)
/// own a namespace once instantiated; link-layer nodes own a bridge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: u32,
    pub name: String,
    pub node_type: NodeType,
    pub model: Option<String>,
    pub position: Position,
    pub geo: Option<GeoPosition>,
    pub icon: Option<String>,
    pub canvas: Option<u32>,
    pub server: Option<String>,
    pub interfaces: Vec<u32>,
    /// Names of the session-wide services enabled on this node (§3).
    pub services: Vec<String>,
    /// Per-node customization of an enabled service: replaces the
    /// session-wide default entirely when present for that name.
    pub service_overrides: HashMap<String, Service>,
}

impl Node {
    pub fn new(id: u32, name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id,
            name: name.into(),
            node_type,
            model: None,
            position: Position::default(),
            geo: None,
            icon: None,
            canvas: None,
            server: None,
            interfaces: Vec::new(),
            services: Vec::new(),
            service_overrides: HashMap::new(),
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_geo(mut self, geo: GeoPosition) -> Self {
        self.geo = Some(geo);
        self
    }

    /// Enable a session-defined service by name on this node.
    pub fn with_service(mut self, name: impl Into<String>) -> Self {
        self.services.push(name.into());
        self
    }

    /// Enable `service` on this node, overriding the session-wide default
    /// of the same name entirely.
    pub fn with_service_override(mut self, service: Service) -> Self {
        self.services.push(service.name.clone());
        self.service_overrides.insert(service.name.clone(), service);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_distance_is_euclidean() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(3.0, 4.0, 0.0);
        assert_eq!(a.distance(&b), 5.0);
    }

    #[test]
    fn node_builder_sets_optional_fields() {
        let node = Node::new(1, "n1", NodeType::Default)
            .with_position(Position::new(1.0, 2.0, 0.0))
            .with_geo(GeoPosition::new(10.0, 20.0, 0.0));
        assert_eq!(node.position.x, 1.0);
        assert_eq!(node.geo.unwrap().lat, 10.0);
    }

    #[test]
    fn with_service_enables_by_name_without_an_override() {
        let node = Node::new(1, "n1", NodeType::Default).with_service("A");
        assert_eq!(node.services, vec!["A".to_string()]);
        assert!(node.service_overrides.is_empty());
    }

    #[test]
    fn with_service_override_enables_and_stores_the_override() {
        use crate::service::Service;
        let node = Node::new(1, "n1", NodeType::Default).with_service_override(Service::new("A"));
        assert_eq!(node.services, vec!["A".to_string()]);
        assert!(node.service_overrides.contains_key("A"));
    }
}
