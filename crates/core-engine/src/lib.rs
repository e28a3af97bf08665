//! Session engine: the state machine, service scheduler, wireless range
//! model, mobility and coordinate systems, event bus, throughput
//! sampler, session registry, distributed broker, and control-network
//! builder that sit on top of [`core_model`]'s data types and
//! [`core_netns`]'s namespace/fabric driver.

pub mod broker;
pub mod bus;
pub mod control_net;
pub mod coords;
pub mod error;
pub mod fsm;
pub mod mobility;
pub mod range;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod throughput;

pub use broker::{BrokerRole, DistributedBroker, PeerChannel, PeerStatus};
pub use bus::{Event, EventBus, SharedEventBus, Topic};
pub use control_net::ControlNetworkBuilder;
pub use coords::{CoordinateSystem, Projection};
pub use error::{EngineError, EngineResult};
pub use fsm::SessionFsm;
pub use mobility::{MobilityTrack, Waypoint};
pub use range::{MemberPair, RangeEvent, RangeModel};
pub use registry::{SessionHandle, SessionRegistry, SessionSnapshot};
pub use runtime::SessionRuntime;
pub use scheduler::{order_services, ServiceRunner};
pub use throughput::{ThroughputSample, ThroughputSampler};
