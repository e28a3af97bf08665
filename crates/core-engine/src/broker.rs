//! Distributed broker (§4.11): for a session spanning multiple daemons,
//! the master mirrors node assignment to its peers, arranges the gretap
//! tunnels that carry any wired link crossing a server boundary, and
//! relays peer event-bus traffic back under the master's session id.
//!
//! Channel loss marks a peer unreachable and raises a fatal alert; the
//! master keeps serving its local subset and reports degraded state
//! rather than tearing the session down.

use crate::error::{EngineError, EngineResult};
use core_model::alert::{Alert, AlertLog};
use core_model::wire::AlertLevel;
use core_netns::Fabric;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrokerRole {
    Master,
    Peer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerStatus {
    Connected,
    Unreachable,
}

#[derive(Clone, Debug)]
pub struct PeerChannel {
    pub name: String,
    pub address: IpAddr,
    pub status: PeerStatus,
}

/// Session-unique GRE tunnel key allocation plus peer bookkeeping. Does
/// not itself open the control channels — that's a transport concern the
/// engine's caller wires up — but owns the state a broker needs to decide
/// whether a peer is reachable and what key a new cross-server link gets.
pub struct DistributedBroker {
    role: BrokerRole,
    peers: HashMap<String, PeerChannel>,
    next_tunnel_key: u32,
    alerts: AlertLog,
}

impl DistributedBroker {
    pub fn new(role: BrokerRole) -> Self {
        Self {
            role,
            peers: HashMap::new(),
            next_tunnel_key: 1,
            alerts: AlertLog::new(std::time::Duration::from_secs(1)),
        }
    }

    pub fn role(&self) -> BrokerRole {
        self.role
    }

    pub fn add_peer(&mut self, name: impl Into<String>, address: IpAddr) {
        let name = name.into();
        self.peers.insert(
            name.clone(),
            PeerChannel {
                name,
                address,
                status: PeerStatus::Connected,
            },
        );
    }

    pub fn peer(&self, name: &str) -> Option<&PeerChannel> {
        self.peers.get(name)
    }

    pub fn connected_peers(&self) -> impl Iterator<Item = &PeerChannel> {
        self.peers.values().filter(|p| p.status == PeerStatus::Connected)
    }

    /// Mark a peer's channel lost. Returns the fatal alert to surface on
    /// the session's alert stream, or `None` if nothing changed (the
    /// failure was already recorded and is within the per-peer rate
    /// limit).
    pub fn mark_unreachable(&mut self, name: &str, now: Instant) -> Option<Alert> {
        let peer = self.peers.get_mut(name)?;
        peer.status = PeerStatus::Unreachable;
        let alert = Alert::new(AlertLevel::Fatal, format!("peer:{name}"), "distributed peer channel lost");
        if self.alerts.record(alert.clone(), now) {
            warn!("peer '{}' marked unreachable", name);
            Some(alert)
        } else {
            None
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.peers.values().any(|p| p.status == PeerStatus::Unreachable)
    }

    fn next_key(&mut self) -> u32 {
        let key = self.next_tunnel_key;
        self.next_tunnel_key += 1;
        key
    }

    /// Build the gretap tunnel for a wired link that crosses from
    /// `local_ns`/`local_addr` to `peer_name`'s daemon, and attach it to
    /// `bridge` on the local side. The peer side is built by the peer
    /// daemon when it receives the mirrored link-create instruction over
    /// its own control channel — that transport is out of this broker's
    /// scope.
    pub async fn build_cross_server_link(
        &mut self,
        fabric: &mut Fabric,
        local_ns: &str,
        local_addr: IpAddr,
        peer_name: &str,
        bridge: &str,
    ) -> EngineResult<(u32, String)> {
        let peer = self
            .peers
            .get(peer_name)
            .ok_or_else(|| EngineError::PeerUnreachable(peer_name.to_string()))?;
        if peer.status == PeerStatus::Unreachable {
            return Err(EngineError::PeerUnreachable(peer_name.to_string()));
        }
        let remote = peer.address;
        let key = self.next_key();
        let name = fabric.build_gre_tunnel(local_ns, local_addr, remote, key, bridge).await?;
        Ok((key, name))
    }
}
