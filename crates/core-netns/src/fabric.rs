//! Network fabric orchestrator (§4.2, §4.3, §4.4): the single entry point
//! the engine layer uses to turn a [`core_model::SessionRecord`]'s nodes
//! and links into real namespaces, veths/bridges, addresses, and `tc`
//! impairments, and to tear them back down again.
//!
//! Device naming is deterministic and namespace-scoped: a veth endpoint's
//! host-side name only has to be unique while it lives in the root
//! namespace awaiting a move, so `v<node>.<iface>` comfortably fits the
//! 15-character device name limit for any session of practical size.

use crate::addr::{AddressConfig, Configurer as AddrConfigurer};
use crate::netns::{ExecOutput, Manager as NetNsManager, TerminalHandle};
use crate::qdisc::{NetemConfig, QdiscManager};
use crate::veth::{is_valid_interface_name, BridgeManager, PairManager as VethManager};
use crate::FabricError;
use core_model::wire::NodeType;
use core_model::{Interface, LinkOptions};
use ipnetwork::IpNetwork;
use std::net::IpAddr;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::info;

pub const BRIDGE_DEVICE_NAME: &str = "br0";
/// GRE/gretap encapsulation overhead leaves headroom under the usual 1500
/// byte path MTU; §4.3 caps gretap device MTU at this value.
pub const GRETAP_MAX_MTU: u32 = 1458;

/// Deterministic gretap device name for a session-unique tunnel key.
pub fn gretap_ifname(key: u32) -> Result<String, FabricError> {
    let name = format!("gt{key}");
    if !is_valid_interface_name(&name) {
        return Err(FabricError::InvalidConfig(format!(
            "generated gretap name '{name}' is invalid or exceeds 15 characters"
        )));
    }
    Ok(name)
}

/// Deterministic namespace name for a network node.
pub fn namespace_name(node_id: u32) -> String {
    format!("core.{node_id}")
}

/// Deterministic host-side veth endpoint name before it's moved into the
/// owning node's namespace.
pub fn endpoint_ifname(node_id: u32, iface_id: u32) -> Result<String, FabricError> {
    let name = format!("v{node_id}.{iface_id}");
    if !is_valid_interface_name(&name) {
        return Err(FabricError::InvalidConfig(format!(
            "generated interface name '{name}' is invalid or exceeds 15 characters"
        )));
    }
    Ok(name)
}

pub struct Fabric {
    netns: NetNsManager,
    veth: VethManager,
    addr: AddrConfigurer,
    qdisc: QdiscManager,
    netns_base_dir: PathBuf,
}

impl Fabric {
    pub async fn new() -> Result<Self, FabricError> {
        Ok(Self {
            netns: NetNsManager::new()?,
            veth: VethManager::new().await?,
            addr: AddrConfigurer::new().await?,
            qdisc: QdiscManager::new(),
            netns_base_dir: PathBuf::from("/var/run/netns"),
        })
    }

    #[cfg(test)]
    pub fn with_base_dir(mut self, dir: PathBuf) -> Self {
        self.netns_base_dir = dir;
        self
    }

    /// Create a node's namespace and bring up loopback. For link-layer
    /// nodes (switch/hub/WLAN), also create the node's bridge.
    pub async fn instantiate_node(&mut self, node_id: u32, node_type: NodeType) -> Result<(), FabricError> {
        let ns = namespace_name(node_id);
        self.netns.create_namespace(&ns).await?;
        self.addr.configure_loopback(&ns, &self.netns).await?;

        if node_type.is_link_layer() {
            BridgeManager::create_in_namespace(&ns, BRIDGE_DEVICE_NAME, &self.netns_base_dir).await?;
        }

        info!("instantiated node {} ({:?}) in namespace {}", node_id, node_type, ns);
        Ok(())
    }

    /// Tear down a node's namespace (and everything inside it — veths,
    /// bridges, qdiscs all go away with the namespace itself).
    pub async fn destroy_node(&mut self, node_id: u32) -> Result<(), FabricError> {
        let ns = namespace_name(node_id);
        self.netns.delete_namespace(&ns).await?;
        Ok(())
    }

    /// Wire a point-to-point link between two node-owned interfaces:
    /// create the veth pair, move each end into its node's namespace,
    /// assign addresses, bring both ends up, and apply impairments.
    ///
    /// Both host-side ends are always shaped. For a unidirectional link
    /// `node2_options` carries the reverse direction's impairments; pass
    /// `options` itself for a plain bidirectional link.
    #[allow(clippy::too_many_arguments)]
    pub async fn instantiate_wired_link(
        &mut self,
        node1_id: u32,
        iface1: &Interface,
        node2_id: u32,
        iface2: &Interface,
        options: &LinkOptions,
        node2_options: &LinkOptions,
    ) -> Result<(), FabricError> {
        let name1 = endpoint_ifname(node1_id, iface1.id)?;
        let name2 = endpoint_ifname(node2_id, iface2.id)?;
        let ns1 = namespace_name(node1_id);
        let ns2 = namespace_name(node2_id);

        self.veth.create_pair(&name1, &name2).await?;
        self.veth.move_to_namespace(&name1, &ns1, &self.netns).await?;
        self.veth.move_to_namespace(&name2, &ns2, &self.netns).await?;
        self.veth.set_mtu(&name1, iface1.mtu, Some(&self.netns)).await?;
        self.veth.set_mtu(&name2, iface2.mtu, Some(&self.netns)).await?;
        self.veth.set_up(&name1, Some(&self.netns)).await?;
        self.veth.set_up(&name2, Some(&self.netns)).await?;

        for net in &iface1.ipv4 {
            self.assign_address(&ns1, &name1, IpNetwork::V4(*net)).await?;
        }
        for net in &iface2.ipv4 {
            self.assign_address(&ns2, &name2, IpNetwork::V4(*net)).await?;
        }

        self.apply_link_options(&ns1, &name1, options).await?;
        self.apply_link_options(&ns2, &name2, node2_options).await?;

        info!("instantiated wired link {}@{} <-> {}@{}", name1, ns1, name2, ns2);
        Ok(())
    }

    /// Attach a member node's interface to a link-layer node's bridge
    /// (the shared-medium equivalent of [`Self::instantiate_wired_link`]).
    pub async fn attach_to_network_node(
        &mut self,
        member_node_id: u32,
        member_iface: &Interface,
        network_node_id: u32,
        options: &LinkOptions,
    ) -> Result<(), FabricError> {
        let member_name = endpoint_ifname(member_node_id, member_iface.id)?;
        let bridge_name = endpoint_ifname(network_node_id, member_iface.id)?;
        let member_ns = namespace_name(member_node_id);
        let network_ns = namespace_name(network_node_id);

        self.veth.create_pair(&member_name, &bridge_name).await?;
        self.veth.move_to_namespace(&member_name, &member_ns, &self.netns).await?;
        self.veth.move_to_namespace(&bridge_name, &network_ns, &self.netns).await?;
        self.veth.set_mtu(&member_name, member_iface.mtu, Some(&self.netns)).await?;
        self.veth.set_up(&member_name, Some(&self.netns)).await?;
        self.veth.set_up(&bridge_name, Some(&self.netns)).await?;
        BridgeManager::attach_member(&network_ns, BRIDGE_DEVICE_NAME, &bridge_name, &self.netns_base_dir).await?;

        for net in &member_iface.ipv4 {
            self.assign_address(&member_ns, &member_name, IpNetwork::V4(*net)).await?;
        }

        self.apply_link_options(&member_ns, &member_name, options).await?;

        info!(
            "attached node {} to network node {} via {}/{}",
            member_node_id, network_node_id, member_name, bridge_name
        );
        Ok(())
    }

    async fn assign_address(&self, ns: &str, iface: &str, address: IpNetwork) -> Result<(), FabricError> {
        self.addr
            .add_address(
                AddressConfig {
                    interface: iface.to_string(),
                    address,
                    namespace: Some(ns.to_string()),
                },
                Some(&self.netns),
            )
            .await?;
        Ok(())
    }

    /// Re-apply impairments for an already-wired interface — the delta
    /// path used by a link-options update or a mobility-driven range
    /// recompute, where the veth itself doesn't need to be touched.
    pub async fn apply_link_options(&self, ns: &str, iface: &str, options: &LinkOptions) -> Result<(), FabricError> {
        let config = NetemConfig::from_link_options(options);
        self.qdisc
            .apply_netem_in_namespace(ns, iface, &config, &self.netns_base_dir)
            .await?;
        Ok(())
    }

    pub async fn remove_link_options(&self, ns: &str, iface: &str) -> Result<(), FabricError> {
        self.qdisc.remove_all_in_namespace(ns, iface, &self.netns_base_dir).await?;
        Ok(())
    }

    /// Build a gretap device in `ns` keyed by `key`, capped at
    /// [`GRETAP_MAX_MTU`], and attach it to `bridge` so a cross-server
    /// wired link rides the tunnel the same way a local veth would (§4.3,
    /// §4.11).
    pub async fn build_gre_tunnel(
        &mut self,
        ns: &str,
        local: IpAddr,
        remote: IpAddr,
        key: u32,
        bridge: &str,
    ) -> Result<String, FabricError> {
        let name = gretap_ifname(key)?;
        let status = Command::new("ip")
            .args([
                "netns",
                "exec",
                ns,
                "ip",
                "link",
                "add",
                &name,
                "type",
                "gretap",
                "local",
                &local.to_string(),
                "remote",
                &remote.to_string(),
                "key",
                &key.to_string(),
            ])
            .env("IP_NETNS_DIR", &self.netns_base_dir)
            .status()
            .await
            .map_err(FabricError::Io)?;
        if !status.success() {
            return Err(FabricError::InvalidConfig(format!("failed to create gretap device {name} in {ns}")));
        }

        // The gretap device lives entirely inside `ns` and was created via
        // `ip netns exec`, not through the rtnetlink-backed veth manager,
        // so finish configuring it the same way rather than through
        // `self.veth` (which only tracks interfaces it created itself).
        let mtu_status = Command::new("ip")
            .args(["netns", "exec", ns, "ip", "link", "set", &name, "mtu", &GRETAP_MAX_MTU.to_string(), "up"])
            .env("IP_NETNS_DIR", &self.netns_base_dir)
            .status()
            .await
            .map_err(FabricError::Io)?;
        if !mtu_status.success() {
            return Err(FabricError::InvalidConfig(format!("failed to bring up gretap device {name} in {ns}")));
        }
        BridgeManager::attach_member(ns, bridge, &name, &self.netns_base_dir).await?;

        info!("built gretap {} in {} keyed {} to {}", name, ns, key, remote);
        Ok(name)
    }

    /// Create a control-network bridge in the host's own namespace (§2).
    pub async fn build_host_bridge(&mut self, name: &str) -> Result<(), FabricError> {
        BridgeManager::create_in_host(name).await?;
        Ok(())
    }

    /// Wire a node onto a host-side control bridge: one veth end goes
    /// into the node's namespace and gets an address, the other stays in
    /// the host namespace and joins the bridge directly.
    pub async fn attach_node_to_host_bridge(
        &mut self,
        node_id: u32,
        iface: &Interface,
        bridge: &str,
    ) -> Result<(), FabricError> {
        let member_name = endpoint_ifname(node_id, iface.id)?;
        let host_name = format!("h{node_id}.{}", iface.id);
        if !is_valid_interface_name(&host_name) {
            return Err(FabricError::InvalidConfig(format!(
                "generated host-side control interface name '{host_name}' is invalid or exceeds 15 characters"
            )));
        }
        let ns = namespace_name(node_id);

        self.veth.create_pair(&member_name, &host_name).await?;
        self.veth.move_to_namespace(&member_name, &ns, &self.netns).await?;
        self.veth.set_mtu(&member_name, iface.mtu, Some(&self.netns)).await?;
        self.veth.set_up(&member_name, Some(&self.netns)).await?;
        self.veth.set_up(&host_name, None).await?;
        BridgeManager::attach_member_in_host(bridge, &host_name).await?;

        for net in &iface.ipv4 {
            self.assign_address(&ns, &member_name, IpNetwork::V4(*net)).await?;
        }

        info!("attached node {} to control bridge {} via {}/{}", node_id, bridge, member_name, host_name);
        Ok(())
    }

    /// Run `argv` inside `node_id`'s namespace via the namespace driver's
    /// `exec` contract (§4.2) — the one path through which service
    /// startup/validate/shutdown commands and ad hoc node commands run.
    pub async fn exec(
        &self,
        node_id: u32,
        argv: &[String],
        stdin: Option<&[u8]>,
        shell: bool,
        wait: bool,
    ) -> Result<Option<ExecOutput>, FabricError> {
        let ns = namespace_name(node_id);
        Ok(self.netns.exec(&ns, argv, stdin, shell, wait).await?)
    }

    /// Open an interactive `shell` in `node_id`'s namespace (§4.2).
    pub fn open_terminal(&self, node_id: u32, shell: &str) -> Result<TerminalHandle, FabricError> {
        let ns = namespace_name(node_id);
        Ok(self.netns.open_terminal(&ns, shell)?)
    }

    /// Tear down a gretap device previously created by
    /// [`Self::build_gre_tunnel`]. Best-effort: the device usually
    /// disappears with its owning namespace anyway.
    pub async fn remove_gre_tunnel(&self, ns: &str, key: u32) {
        if let Ok(name) = gretap_ifname(key) {
            let _ = Command::new("ip")
                .args(["netns", "exec", ns, "ip", "link", "del", &name])
                .env("IP_NETNS_DIR", &self.netns_base_dir)
                .status()
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_names_are_deterministic() {
        assert_eq!(namespace_name(7), "core.7");
    }

    #[test]
    fn endpoint_names_fit_device_limit() {
        let name = endpoint_ifname(1, 0).unwrap();
        assert!(name.len() <= 15);
        assert_eq!(name, "v1.0");
    }

    #[test]
    fn overlong_endpoint_names_are_rejected() {
        assert!(endpoint_ifname(123_456_789, 987_654_321).is_err());
    }
}
