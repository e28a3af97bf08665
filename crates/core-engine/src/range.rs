//! WLAN range model (§4.5): derives link/unlink events from node
//! positions and a configured range threshold, and installs/removes the
//! `ebtables` filters on a WLAN node's bridge that actually enforce them.
//!
//! Moving one node only re-evaluates that node's distance to every other
//! member of the same wireless network — O(k) in the network's member
//! count rather than an O(n^2) recompute of the whole topology on every
//! tick.

use core_model::Position;
use std::collections::{HashMap, HashSet};
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemberPair(pub u32, pub u32);

impl MemberPair {
    fn new(a: u32, b: u32) -> Self {
        if a <= b {
            MemberPair(a, b)
        } else {
            MemberPair(b, a)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeEvent {
    Linked(MemberPair),
    Unlinked(MemberPair),
}

/// Range model for a single WLAN/wireless network node. Distance is
/// compared in canvas units against `range`; nodes exactly at `range` are
/// treated as linked (tie-break toward connectivity, matching the "at
/// range" edge case called out for the wireless model).
pub struct RangeModel {
    range: f64,
    positions: HashMap<u32, Position>,
    linked: HashSet<MemberPair>,
}

impl RangeModel {
    pub fn new(range: f64) -> Self {
        Self {
            range,
            positions: HashMap::new(),
            linked: HashSet::new(),
        }
    }

    pub fn set_range(&mut self, range: f64) -> Vec<RangeEvent> {
        self.range = range;
        let members: Vec<u32> = self.positions.keys().copied().collect();
        let mut events = Vec::new();
        for (i, &a) in members.iter().enumerate() {
            for &b in &members[i + 1..] {
                events.extend(self.reevaluate_pair(a, b));
            }
        }
        events
    }

    /// Record/update a member's position and return any link/unlink
    /// events triggered against every other tracked member.
    pub fn update_position(&mut self, node_id: u32, position: Position) -> Vec<RangeEvent> {
        self.positions.insert(node_id, position);
        let others: Vec<u32> = self.positions.keys().copied().filter(|&id| id != node_id).collect();
        let mut events = Vec::new();
        for other in others {
            events.extend(self.reevaluate_pair(node_id, other));
        }
        events
    }

    pub fn remove_member(&mut self, node_id: u32) -> Vec<RangeEvent> {
        self.positions.remove(&node_id);
        let stale: Vec<MemberPair> = self
            .linked
            .iter()
            .copied()
            .filter(|p| p.0 == node_id || p.1 == node_id)
            .collect();
        stale
            .into_iter()
            .map(|p| {
                self.linked.remove(&p);
                RangeEvent::Unlinked(p)
            })
            .collect()
    }

    fn reevaluate_pair(&mut self, a: u32, b: u32) -> Option<RangeEvent> {
        let pos_a = self.positions.get(&a)?;
        let pos_b = self.positions.get(&b)?;
        let distance = pos_a.distance(pos_b);
        let pair = MemberPair::new(a, b);
        let now_linked = distance <= self.range;
        let was_linked = self.linked.contains(&pair);

        if now_linked && !was_linked {
            self.linked.insert(pair);
            Some(RangeEvent::Linked(pair))
        } else if !now_linked && was_linked {
            self.linked.remove(&pair);
            Some(RangeEvent::Unlinked(pair))
        } else {
            None
        }
    }

    pub fn is_linked(&self, a: u32, b: u32) -> bool {
        self.linked.contains(&MemberPair::new(a, b))
    }
}

/// Enforces a [`RangeEvent`] on a WLAN node's bridge by installing or
/// removing an `ebtables` rule dropping frames between the two members'
/// bridge ports. Requires the bridge's member interfaces to already be
/// named and attached (see `core_netns::fabric`).
pub async fn apply_range_event(ns: &str, event: RangeEvent, iface_for: impl Fn(u32) -> String) -> Result<(), std::io::Error> {
    let (pair, action) = match event {
        RangeEvent::Linked(p) => (p, "-D"),
        RangeEvent::Unlinked(p) => (p, "-A"),
    };
    let if_a = iface_for(pair.0);
    let if_b = iface_for(pair.1);

    for (src, dst) in [(if_a.clone(), if_b.clone()), (if_b, if_a)] {
        let output = Command::new("ip")
            .args([
                "netns", "exec", ns, "ebtables", action, "FORWARD", "-i", &src, "-o", &dst, "-j", "DROP",
            ])
            .output()
            .await?;
        if !output.status.success() {
            warn!(
                "ebtables {} FORWARD -i {} -o {} failed: {}",
                action,
                src,
                dst,
                String::from_utf8_lossy(&output.stderr)
            );
        } else {
            debug!("ebtables {} FORWARD -i {} -o {} applied", action, src, dst);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_link_when_moved_into_range() {
        let mut model = RangeModel::new(100.0);
        model.update_position(1, Position::new(0.0, 0.0, 0.0));
        let events = model.update_position(2, Position::new(50.0, 0.0, 0.0));
        assert_eq!(events, vec![RangeEvent::Linked(MemberPair(1, 2))]);
    }

    #[test]
    fn nodes_unlink_when_moved_out_of_range() {
        let mut model = RangeModel::new(100.0);
        model.update_position(1, Position::new(0.0, 0.0, 0.0));
        model.update_position(2, Position::new(50.0, 0.0, 0.0));
        let events = model.update_position(2, Position::new(500.0, 0.0, 0.0));
        assert_eq!(events, vec![RangeEvent::Unlinked(MemberPair(1, 2))]);
    }

    #[test]
    fn exactly_at_range_is_linked() {
        let mut model = RangeModel::new(100.0);
        model.update_position(1, Position::new(0.0, 0.0, 0.0));
        let events = model.update_position(2, Position::new(100.0, 0.0, 0.0));
        assert_eq!(events, vec![RangeEvent::Linked(MemberPair(1, 2))]);
    }

    #[test]
    fn only_moved_node_is_reevaluated() {
        let mut model = RangeModel::new(10.0);
        model.update_position(1, Position::new(0.0, 0.0, 0.0));
        model.update_position(2, Position::new(5.0, 0.0, 0.0));
        model.update_position(3, Position::new(1000.0, 0.0, 0.0));
        // Moving node 3 further away shouldn't touch the 1<->2 link.
        let events = model.update_position(3, Position::new(2000.0, 0.0, 0.0));
        assert!(events.is_empty());
        assert!(model.is_linked(1, 2));
    }

    #[test]
    fn remove_member_unlinks_its_pairs() {
        let mut model = RangeModel::new(100.0);
        model.update_position(1, Position::new(0.0, 0.0, 0.0));
        model.update_position(2, Position::new(10.0, 0.0, 0.0));
        let events = model.remove_member(1);
        assert_eq!(events, vec![RangeEvent::Unlinked(MemberPair(1, 2))]);
    }
}
