//! Link definitions (§3): wired point-to-point and node-to-network-node
//! links, plus the netem-style impairment options carried on each
//! direction.

use crate::wire::LinkType;
use serde::{Deserialize, Serialize};

/// Per-direction impairment options, applied via the namespace/fabric
/// layer's tc/netem driver. Values mirror the units used by `tc netem`
/// directly (bandwidth in bps, delay/jitter in microseconds, loss/
/// duplicate/burst as percentages 0-100) so the fabric layer can apply
/// them without unit conversion at the point of use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkOptions {
    pub bandwidth_bps: Option<u64>,
    pub delay_us: Option<u32>,
    pub jitter_us: Option<u32>,
    pub loss_pct: Option<f64>,
    pub duplicate_pct: Option<f64>,
    pub burst_bytes: Option<u32>,
    pub mburst_bytes: Option<u32>,
    pub buffer_packets: Option<u32>,
    pub key: Option<u32>,
    pub unidirectional: bool,
}

impl LinkOptions {
    pub fn is_default(&self) -> bool {
        *self == LinkOptions::default()
    }
}

/// One end of a link: a node id and, for wired links, the interface on
/// that node that terminates the link. Network-node endpoints (a link
/// into a switch/hub/WLAN cloud) carry no interface id on that side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEndpoint {
    pub node_id: u32,
    pub iface_id: Option<u32>,
}

impl LinkEndpoint {
    pub fn new(node_id: u32, iface_id: Option<u32>) -> Self {
        Self { node_id, iface_id }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Link {
    pub id: u32,
    pub link_type: LinkType,
    pub node1: LinkEndpoint,
    pub node2: LinkEndpoint,
    pub network_id: Option<u32>,
    pub options: LinkOptions,
    /// Node2-side options for a unidirectional link. `None` means node2's
    /// end is shaped with `options` too (a plain bidirectional link); only
    /// meaningful when `options.unidirectional` is set.
    #[serde(default)]
    pub reverse_options: Option<LinkOptions>,
}

impl Link {
    pub fn new(id: u32, link_type: LinkType, node1: LinkEndpoint, node2: LinkEndpoint) -> Self {
        Self {
            id,
            link_type,
            node1,
            node2,
            network_id: None,
            options: LinkOptions::default(),
            reverse_options: None,
        }
    }

    /// The options node2's end should be shaped with: the explicit reverse
    /// record when this is a unidirectional link that carries one, `options`
    /// itself otherwise (§3).
    pub fn node2_options(&self) -> &LinkOptions {
        if self.options.unidirectional {
            self.reverse_options.as_ref().unwrap_or(&self.options)
        } else {
            &self.options
        }
    }

    /// True if this link connects the same (node, iface) pair as
    /// `other`, in either orientation — the invariant that at most one
    /// wired link may exist between any two endpoints.
    pub fn connects_same_endpoints(&self, other: &Link) -> bool {
        let a = (self.node1, self.node2);
        let b = (other.node1, other.node2);
        a == b || a == (b.1, b.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(node: u32, iface: u32) -> LinkEndpoint {
        LinkEndpoint::new(node, Some(iface))
    }

    #[test]
    fn same_endpoints_detected_regardless_of_order() {
        let a = Link::new(1, LinkType::Wired, endpoint(1, 0), endpoint(2, 0));
        let b = Link::new(2, LinkType::Wired, endpoint(2, 0), endpoint(1, 0));
        assert!(a.connects_same_endpoints(&b));
    }

    #[test]
    fn different_endpoints_not_detected_as_same() {
        let a = Link::new(1, LinkType::Wired, endpoint(1, 0), endpoint(2, 0));
        let c = Link::new(3, LinkType::Wired, endpoint(1, 0), endpoint(3, 0));
        assert!(!a.connects_same_endpoints(&c));
    }

    #[test]
    fn default_options_have_no_impairments() {
        let link = Link::new(1, LinkType::Wired, endpoint(1, 0), endpoint(2, 0));
        assert!(link.options.is_default());
    }

    #[test]
    fn node2_options_fall_back_to_options_when_bidirectional() {
        let mut link = Link::new(1, LinkType::Wired, endpoint(1, 0), endpoint(2, 0));
        link.options.delay_us = Some(1000);
        assert_eq!(link.node2_options().delay_us, Some(1000));
    }

    #[test]
    fn node2_options_use_reverse_record_when_unidirectional() {
        let mut link = Link::new(1, LinkType::Wired, endpoint(1, 0), endpoint(2, 0));
        link.options.unidirectional = true;
        link.options.delay_us = Some(1000);
        link.reverse_options = Some(LinkOptions {
            delay_us: Some(2000),
            ..LinkOptions::default()
        });
        assert_eq!(link.node2_options().delay_us, Some(2000));
    }

    #[test]
    fn node2_options_default_to_forward_when_unidirectional_without_reverse() {
        let mut link = Link::new(1, LinkType::Wired, endpoint(1, 0), endpoint(2, 0));
        link.options.unidirectional = true;
        link.options.delay_us = Some(1000);
        assert_eq!(link.node2_options().delay_us, Some(1000));
    }
}
