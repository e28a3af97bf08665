//! Session runtime (§4.1, §4.3-§4.9): the live, per-session handles the
//! FSM's component work reaches into — the namespace/fabric driver, the
//! event bus, and the per-node mobility/range/throughput engines.
//!
//! `SessionRecord` is pure data and survives a session reset; a
//! `SessionRuntime` is constructed once the session actor starts and is
//! rebuilt from scratch on every `Shutdown -> Definition` cycle.

use crate::bus::{self, Event, SharedEventBus, Topic};
use crate::error::EngineResult;
use crate::mobility::MobilityTrack;
use crate::range::RangeModel;
use crate::throughput::ThroughputSampler;
use core_netns::Fabric;
use std::collections::HashMap;

/// Seed range for a WLAN/wireless network node until per-node range
/// configuration is wired up (tracked as an open question, see DESIGN.md).
pub const DEFAULT_WLAN_RANGE: f64 = 250.0;

pub struct SessionRuntime {
    pub fabric: Fabric,
    pub bus: SharedEventBus,
    pub mobility: HashMap<u32, MobilityTrack>,
    pub range_models: HashMap<u32, RangeModel>,
    pub throughput: HashMap<u32, ThroughputSampler>,
}

impl SessionRuntime {
    pub async fn new() -> EngineResult<Self> {
        Ok(Self {
            fabric: Fabric::new().await?,
            bus: bus::shared(),
            mobility: HashMap::new(),
            range_models: HashMap::new(),
            throughput: HashMap::new(),
        })
    }

    /// Publish an event on the session's bus. Swallows a poisoned-lock
    /// failure — a stuck subscriber should never be able to break
    /// component work that's only trying to report its own outcome.
    pub fn publish(&self, topic: Topic, payload: impl Into<String>) {
        if let Ok(mut bus) = self.bus.lock() {
            bus.publish(Event { topic, payload: payload.into() });
        }
    }

    /// Drop all per-node engine state, leaving `fabric` and `bus` intact.
    /// Used on the way into `Shutdown`, once every node has been torn down.
    pub fn clear_node_state(&mut self) {
        self.mobility.clear();
        self.range_models.clear();
        self.throughput.clear();
    }
}
