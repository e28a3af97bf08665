//! Control-network builder (§2): an optional side-channel bridge wiring
//! the host to every session node for out-of-band management traffic
//! (independent of whatever data-plane links the session also has),
//! plus up to three auxiliary control planes for sessions that want more
//! than one isolated management segment.

use crate::error::EngineResult;
use core_model::Interface;
use core_netns::Fabric;
use std::collections::HashSet;
use thiserror::Error;

pub const MAX_AUXILIARY_PLANES: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ControlNetError {
    #[error("control plane index {0} exceeds the maximum of {MAX_AUXILIARY_PLANES} auxiliary planes")]
    TooManyPlanes(usize),
    #[error("control plane {0} is not enabled for this session")]
    PlaneNotEnabled(usize),
}

/// `0` is the primary control plane; `1..=MAX_AUXILIARY_PLANES` are
/// auxiliary planes.
pub fn bridge_name(plane: usize) -> Result<String, ControlNetError> {
    if plane > MAX_AUXILIARY_PLANES {
        return Err(ControlNetError::TooManyPlanes(plane));
    }
    Ok(if plane == 0 {
        "ctrl0".to_string()
    } else {
        format!("ctrl{plane}")
    })
}

/// Tracks which control planes a session has enabled and drives their
/// bridges through [`Fabric`]. The primary plane (0) is optional — a
/// session with no control network simply never enables it.
#[derive(Default)]
pub struct ControlNetworkBuilder {
    enabled: HashSet<usize>,
}

impl ControlNetworkBuilder {
    pub fn new() -> Self {
        Self { enabled: HashSet::new() }
    }

    pub fn is_enabled(&self, plane: usize) -> bool {
        self.enabled.contains(&plane)
    }

    pub fn enabled_planes(&self) -> Vec<usize> {
        let mut planes: Vec<usize> = self.enabled.iter().copied().collect();
        planes.sort_unstable();
        planes
    }

    /// Create the plane's host bridge and mark it enabled.
    pub async fn enable(&mut self, fabric: &mut Fabric, plane: usize) -> EngineResult<()> {
        let name = bridge_name(plane).map_err(config_error)?;
        fabric.build_host_bridge(&name).await?;
        self.enabled.insert(plane);
        Ok(())
    }

    /// Attach a node's interface to the given plane's bridge. The plane
    /// must already have been enabled with [`Self::enable`].
    pub async fn attach_node(
        &self,
        fabric: &mut Fabric,
        node_id: u32,
        iface: &Interface,
        plane: usize,
    ) -> EngineResult<()> {
        if !self.enabled.contains(&plane) {
            return Err(config_error(ControlNetError::PlaneNotEnabled(plane)));
        }
        let name = bridge_name(plane).map_err(config_error)?;
        fabric.attach_node_to_host_bridge(node_id, iface, &name).await?;
        Ok(())
    }
}

fn config_error(e: ControlNetError) -> crate::error::EngineError {
    crate::error::EngineError::InvalidConfig(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_plane_is_ctrl0() {
        assert_eq!(bridge_name(0).unwrap(), "ctrl0");
    }

    #[test]
    fn auxiliary_planes_are_numbered() {
        assert_eq!(bridge_name(1).unwrap(), "ctrl1");
        assert_eq!(bridge_name(3).unwrap(), "ctrl3");
    }

    #[test]
    fn plane_beyond_maximum_is_rejected() {
        assert!(matches!(bridge_name(4), Err(ControlNetError::TooManyPlanes(4))));
    }

    #[test]
    fn builder_starts_with_no_planes_enabled() {
        let builder = ControlNetworkBuilder::new();
        assert!(!builder.is_enabled(0));
        assert!(builder.enabled_planes().is_empty());
    }
}
