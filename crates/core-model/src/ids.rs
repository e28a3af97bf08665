//! Identifier and address allocation (§4.10).
//!
//! Node, link, and session ids are per-scope integers starting at 1 with
//! "lowest unused" reuse semantics. MAC addresses are handed out from a
//! configurable OUI prefix with a monotonic counter. IPv4/IPv6 subnets are
//! carved out of configured pools, one `/24` (or `/64`) per link-layer
//! cloud or point-to-point link, with host addresses assigned by the
//! lowest unused host bits.

use crate::error::{ModelError, ModelResult};
use ipnetwork::{Ipv4Network, Ipv6Network};
use std::collections::BTreeSet;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Allocates the lowest unused non-zero integer id within some scope
/// (a session's nodes, a session's links, the daemon's sessions, ...).
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    live: BTreeSet<u32>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate and reserve the lowest unused id (starting at 1).
    pub fn allocate(&mut self) -> u32 {
        let mut candidate = 1u32;
        for &id in &self.live {
            if id != candidate {
                break;
            }
            candidate += 1;
        }
        self.live.insert(candidate);
        candidate
    }

    /// Reserve a caller-chosen id (used when restoring a scenario document
    /// that pins ids). Fails if already live.
    pub fn reserve(&mut self, id: u32) -> ModelResult<()> {
        if !self.live.insert(id) {
            return Err(ModelError::DuplicateId(id));
        }
        Ok(())
    }

    /// Release an id back into the unused pool.
    pub fn release(&mut self, id: u32) {
        self.live.remove(&id);
    }

    pub fn is_live(&self, id: u32) -> bool {
        self.live.contains(&id)
    }

    pub fn live_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.live.iter().copied()
    }
}

/// Hands out MAC addresses as `00:00:00:<prefix>:00:<byte>`, where `byte`
/// is a monotonic counter. The start value is configurable so that
/// tunneled sessions sharing a broadcast domain don't collide.
#[derive(Debug, Clone)]
pub struct MacAllocator {
    prefix: u8,
    next_byte: u16,
}

impl MacAllocator {
    pub fn new(prefix: u8, start: u8) -> Self {
        Self {
            prefix,
            next_byte: start as u16,
        }
    }

    pub fn allocate(&mut self) -> ModelResult<[u8; 6]> {
        if self.next_byte > 0xff {
            return Err(ModelError::PoolExhausted);
        }
        let b = self.next_byte as u8;
        self.next_byte += 1;
        Ok([0x00, 0x00, 0x00, self.prefix, 0x00, b])
    }
}

impl Default for MacAllocator {
    fn default() -> Self {
        // Matches the legacy CORE default OUI prefix used by the reference
        // daemon's auto-MAC assignment.
        Self::new(0x00, 1)
    }
}

pub fn format_mac(mac: [u8; 6]) -> String {
    mac.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Carves consecutive `/24` subnets out of a configured IPv4 prefix (one
/// per link-layer cloud or point-to-point link) and hands out host
/// addresses within a subnet by lowest-unused host bits.
#[derive(Debug, Clone)]
pub struct Ipv4Pool {
    base: Ipv4Network,
    next_subnet: u32,
}

impl Ipv4Pool {
    pub fn new(base: Ipv4Network) -> Self {
        Self {
            base,
            next_subnet: 0,
        }
    }

    pub fn default_pool() -> Self {
        Self::new(Ipv4Network::new(Ipv4Addr::new(10, 0, 0, 0), 16).unwrap())
    }

    /// Allocate the next unused `/24` subnet from the pool.
    pub fn allocate_subnet(&mut self) -> ModelResult<Ipv4Subnet> {
        let base_prefix = self.base.prefix();
        if base_prefix > 24 {
            return Err(ModelError::PoolExhausted);
        }
        let subnets_available = 1u32 << (24 - base_prefix);
        if self.next_subnet >= subnets_available {
            return Err(ModelError::PoolExhausted);
        }
        let base_u32 = u32::from(self.base.ip());
        let subnet_base = base_u32 + (self.next_subnet << 8);
        self.next_subnet += 1;
        let network = Ipv4Network::new(Ipv4Addr::from(subnet_base), 24)
            .map_err(|e| ModelError::BadAddress(e.to_string()))?;
        Ok(Ipv4Subnet::new(network))
    }
}

/// A single `/24` (or narrower, e.g. `/30` point-to-point) subnet with
/// lowest-unused host allocation.
#[derive(Debug, Clone)]
pub struct Ipv4Subnet {
    network: Ipv4Network,
    used_hosts: BTreeSet<u32>,
}

impl Ipv4Subnet {
    pub fn new(network: Ipv4Network) -> Self {
        Self {
            network,
            used_hosts: BTreeSet::new(),
        }
    }

    pub fn network(&self) -> Ipv4Network {
        self.network
    }

    /// Allocate the lowest unused host address (host bits 1..broadcast-1).
    pub fn allocate_host(&mut self) -> ModelResult<Ipv4Network> {
        let prefix = self.network.prefix();
        let host_bits = 32 - prefix as u32;
        let max_host = if host_bits >= 32 {
            u32::MAX
        } else {
            (1u32 << host_bits) - 1
        };
        let base = u32::from(self.network.network());
        let mut candidate = 1u32;
        while self.used_hosts.contains(&candidate) {
            candidate += 1;
        }
        if candidate >= max_host {
            return Err(ModelError::PoolExhausted);
        }
        self.used_hosts.insert(candidate);
        let addr = Ipv4Addr::from(base + candidate);
        Ipv4Network::new(addr, prefix).map_err(|e| ModelError::BadAddress(e.to_string()))
    }

    pub fn release_host(&mut self, addr: Ipv4Addr) {
        let base = u32::from(self.network.network());
        let host = u32::from(addr).wrapping_sub(base);
        self.used_hosts.remove(&host);
    }
}

/// Carves `/64` subnets out of a configured IPv6 pool.
#[derive(Debug, Clone)]
pub struct Ipv6Pool {
    base: Ipv6Network,
    next_subnet: u64,
}

impl Ipv6Pool {
    pub fn new(base: Ipv6Network) -> Self {
        Self {
            base,
            next_subnet: 0,
        }
    }

    pub fn default_pool() -> Self {
        Self::new(Ipv6Network::new(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 0), 32).unwrap())
    }

    pub fn allocate_subnet(&mut self) -> ModelResult<Ipv6Network> {
        let base_prefix = self.base.prefix();
        if base_prefix > 64 {
            return Err(ModelError::PoolExhausted);
        }
        let segment = self.next_subnet;
        self.next_subnet += 1;
        let base_segments = self.base.ip().segments();
        let mut segments = base_segments;
        // The subnet counter occupies the 64-48=16 bits directly above the
        // host portion (segments[3]), matching a /32 -> /64 carve.
        segments[3] = segments[3].wrapping_add(segment as u16);
        let network = Ipv6Network::new(Ipv6Addr::from(segments), 64)
            .map_err(|e| ModelError::BadAddress(e.to_string()))?;
        Ok(network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_unused_id_reuse() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.allocate(), 1);
        assert_eq!(alloc.allocate(), 2);
        assert_eq!(alloc.allocate(), 3);
        alloc.release(2);
        assert_eq!(alloc.allocate(), 2);
        assert_eq!(alloc.allocate(), 4);
    }

    #[test]
    fn reserve_rejects_duplicates() {
        let mut alloc = IdAllocator::new();
        alloc.reserve(5).unwrap();
        assert!(alloc.reserve(5).is_err());
        assert_eq!(alloc.allocate(), 1);
    }

    #[test]
    fn mac_allocator_increments_low_byte() {
        let mut mac = MacAllocator::new(0xaa, 1);
        assert_eq!(format_mac(mac.allocate().unwrap()), "00:00:00:aa:00:01");
        assert_eq!(format_mac(mac.allocate().unwrap()), "00:00:00:aa:00:02");
    }

    #[test]
    fn mac_allocator_exhausts() {
        let mut mac = MacAllocator::new(0, 255);
        assert!(mac.allocate().is_ok());
        assert!(mac.allocate().is_err());
    }

    #[test]
    fn ipv4_pool_hands_out_distinct_slash24s() {
        let mut pool = Ipv4Pool::default_pool();
        let a = pool.allocate_subnet().unwrap();
        let b = pool.allocate_subnet().unwrap();
        assert_eq!(a.network().to_string(), "10.0.0.0/24");
        assert_eq!(b.network().to_string(), "10.0.1.0/24");
    }

    #[test]
    fn subnet_host_allocation_lowest_unused() {
        let mut subnet = Ipv4Subnet::new(Ipv4Network::new(Ipv4Addr::new(10, 0, 0, 0), 24).unwrap());
        let h1 = subnet.allocate_host().unwrap();
        let h2 = subnet.allocate_host().unwrap();
        assert_eq!(h1.ip(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(h2.ip(), Ipv4Addr::new(10, 0, 0, 2));
        subnet.release_host(h1.ip());
        let h3 = subnet.allocate_host().unwrap();
        assert_eq!(h3.ip(), Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn ipv6_pool_hands_out_distinct_slash64s() {
        let mut pool = Ipv6Pool::default_pool();
        let a = pool.allocate_subnet().unwrap();
        let b = pool.allocate_subnet().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.prefix(), 64);
    }
}
