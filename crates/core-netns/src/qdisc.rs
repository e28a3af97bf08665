//! Link impairment application via `tc` (§4.3, §4.4).
//!
//! A full netlink TC encoding (TCA_KIND/TCA_OPTIONS and the nested
//! attributes each qdisc type needs) is a lot of low-level work for no
//! behavioral gain over the `tc` binary, so — like the fabric this module
//! was adapted from — impairments are applied with `ip netns exec <ns> tc
//! ...` rather than hand-rolled netlink messages. This module is the only
//! place that shells out.
//!
//! A shaped interface carries a two-layer qdisc tree: an HTB parent
//! (handle `1:`, single class `1:10`) shaping the interface to the
//! link's bandwidth, with a netem child (handle `10:`, parented off
//! `1:10`) applying delay/jitter/loss/duplicate. When bandwidth is zero
//! the HTB layer is omitted entirely and netem sits directly on root.

use core_model::LinkOptions;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum QdiscError {
    #[error("invalid qdisc configuration: {0}")]
    InvalidConfig(String),

    #[error("tc command failed: {0}")]
    CommandFailed(String),
}

/// `tc netem` parameters derived from a link's options. Units match what
/// `tc` itself expects at the command line (ms, percent, kbit).
#[derive(Clone, Debug, Default)]
pub struct NetemConfig {
    pub delay_ms: u32,
    pub jitter_ms: u32,
    pub loss_pct: f64,
    pub duplicate_pct: f64,
    pub rate_kbit: u64,
    pub buffer_packets: Option<u32>,
}

impl NetemConfig {
    pub fn from_link_options(options: &LinkOptions) -> Self {
        Self {
            delay_ms: options.delay_us.unwrap_or(0) / 1000,
            jitter_ms: options.jitter_us.unwrap_or(0) / 1000,
            loss_pct: options.loss_pct.unwrap_or(0.0),
            duplicate_pct: options.duplicate_pct.unwrap_or(0.0),
            rate_kbit: options.bandwidth_bps.unwrap_or(0) / 1000,
            buffer_packets: options.buffer_packets,
        }
    }

    /// True if this config has no impairments at all, in which case the
    /// fabric layer can skip applying a qdisc entirely.
    pub fn is_noop(&self) -> bool {
        self.delay_ms == 0
            && self.loss_pct <= 0.0
            && self.duplicate_pct <= 0.0
            && self.rate_kbit == 0
    }
}

#[derive(Debug, Default)]
pub struct QdiscManager;

impl QdiscManager {
    pub fn new() -> Self {
        Self
    }

    /// Apply `config` on `iface_name` inside namespace `ns_name` as a
    /// fresh qdisc tree (HTB parent when bandwidth is shaped, netem child
    /// always). Any existing qdisc on the interface is torn down first —
    /// moving between a plain-netem tree and an HTB+netem tree changes the
    /// root qdisc's kind, which `replace` alone can't do across handles.
    pub async fn apply_netem_in_namespace(
        &self,
        ns_name: &str,
        iface_name: &str,
        config: &NetemConfig,
        netns_base_dir: &Path,
    ) -> Result<(), QdiscError> {
        if config.is_noop() {
            return self.remove_all_in_namespace(ns_name, iface_name, netns_base_dir).await;
        }

        self.remove_all_in_namespace(ns_name, iface_name, netns_base_dir).await?;

        let netem_parent = if config.rate_kbit > 0 {
            self.install_htb_parent(ns_name, iface_name, config.rate_kbit, netns_base_dir).await?;
            "1:10"
        } else {
            "root"
        };
        self.install_netem_child(ns_name, iface_name, netem_parent, config, netns_base_dir).await?;

        info!(
            "qdisc tree applied in ns {} on {} (htb={} delay={}ms jitter={}ms loss={}% rate={}kbit)",
            ns_name,
            iface_name,
            config.rate_kbit > 0,
            config.delay_ms,
            config.jitter_ms,
            config.loss_pct,
            config.rate_kbit
        );
        Ok(())
    }

    /// Install the HTB parent (handle `1:`, single class `1:10`) that
    /// caps the interface at `rate_kbit`.
    async fn install_htb_parent(
        &self,
        ns_name: &str,
        iface_name: &str,
        rate_kbit: u64,
        netns_base_dir: &Path,
    ) -> Result<(), QdiscError> {
        let mut qdisc = Command::new("ip");
        qdisc.args(["netns", "exec", ns_name, "tc", "qdisc", "replace", "dev", iface_name]);
        qdisc.args(["root", "handle", "1:", "htb", "default", "10"]);
        qdisc.env("IP_NETNS_DIR", netns_base_dir);
        Self::run(qdisc, "tc qdisc (htb)", ns_name, iface_name).await?;

        let mut class = Command::new("ip");
        class.args(["netns", "exec", ns_name, "tc", "class", "replace", "dev", iface_name]);
        class.args(["parent", "1:", "classid", "1:10", "htb", "rate", &format!("{rate_kbit}kbit")]);
        class.env("IP_NETNS_DIR", netns_base_dir);
        Self::run(class, "tc class (htb)", ns_name, iface_name).await
    }

    /// Install the netem child (handle `10:`) under `parent`, carrying
    /// delay/jitter/loss/duplicate.
    async fn install_netem_child(
        &self,
        ns_name: &str,
        iface_name: &str,
        parent: &str,
        config: &NetemConfig,
        netns_base_dir: &Path,
    ) -> Result<(), QdiscError> {
        let mut cmd = Command::new("ip");
        cmd.args(["netns", "exec", ns_name, "tc", "qdisc", "replace", "dev", iface_name]);
        cmd.args(["parent", parent, "handle", "10:", "netem"]);

        if config.delay_ms > 0 {
            cmd.arg("delay").arg(format!("{}ms", config.delay_ms));
            if config.jitter_ms > 0 {
                cmd.arg(format!("{}ms", config.jitter_ms));
            }
        }

        if config.loss_pct > 0.0 {
            cmd.arg("loss").arg(format!("{}%", config.loss_pct));
        }

        if config.duplicate_pct > 0.0 {
            cmd.arg("duplicate").arg(format!("{}%", config.duplicate_pct));
        }

        if let Some(limit) = config.buffer_packets {
            cmd.arg("limit").arg(limit.to_string());
        }

        cmd.env("IP_NETNS_DIR", netns_base_dir);
        Self::run(cmd, "tc qdisc (netem)", ns_name, iface_name).await
    }

    async fn run(mut cmd: Command, what: &str, ns_name: &str, iface_name: &str) -> Result<(), QdiscError> {
        let output = cmd
            .output()
            .await
            .map_err(|e| QdiscError::CommandFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(QdiscError::CommandFailed(format!(
                "{what} failed in ns {ns_name} on {iface_name}: {stderr}"
            )));
        }
        Ok(())
    }

    /// Remove any qdisc on `iface_name` in `ns_name`. Best-effort: a
    /// missing qdisc (already clean) is not an error.
    pub async fn remove_all_in_namespace(
        &self,
        ns_name: &str,
        iface_name: &str,
        netns_base_dir: &Path,
    ) -> Result<(), QdiscError> {
        let mut cmd = Command::new("ip");
        cmd.arg("netns")
            .arg("exec")
            .arg(ns_name)
            .arg("tc")
            .arg("qdisc")
            .arg("del")
            .arg("dev")
            .arg(iface_name)
            .arg("root");
        cmd.env("IP_NETNS_DIR", netns_base_dir);

        match cmd.output().await {
            Ok(output) if !output.status.success() => {
                debug!(
                    "tc qdisc del in ns {} on {} reported no qdisc present: {}",
                    ns_name,
                    iface_name,
                    String::from_utf8_lossy(&output.stderr)
                );
            }
            Ok(_) => info!("removed qdisc in ns {} on {}", ns_name, iface_name),
            Err(e) => warn!("error executing tc qdisc del in ns {} on {}: {}", ns_name, iface_name, e),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_link_options_units() {
        let options = LinkOptions {
            bandwidth_bps: Some(1_000_000),
            delay_us: Some(50_000),
            jitter_us: Some(5_000),
            loss_pct: Some(1.5),
            duplicate_pct: Some(0.5),
            burst_bytes: None,
            mburst_bytes: None,
            buffer_packets: None,
            key: None,
            unidirectional: false,
        };
        let config = NetemConfig::from_link_options(&options);
        assert_eq!(config.delay_ms, 50);
        assert_eq!(config.jitter_ms, 5);
        assert_eq!(config.rate_kbit, 1000);
        assert_eq!(config.loss_pct, 1.5);
        assert!(!config.is_noop());
    }

    #[test]
    fn default_options_are_noop() {
        let config = NetemConfig::from_link_options(&LinkOptions::default());
        assert!(config.is_noop());
    }
}
