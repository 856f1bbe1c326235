pub mod clock;
pub mod error;
pub mod generator;
pub mod network;
pub mod simulation;
pub mod sink;
pub mod trace;

pub use clock::{Clock, EventHandle, SimTime};
pub use error::{Result, SimError};
pub use generator::{GeneratorConfig, TrafficGenerator, TrafficPattern};
pub use simulation::{RunSummary, Scenario, ScenarioConfig};
pub use trace::TraceCollector;

pub mod prelude {
    pub use crate::clock::{Clock, SimTime, transmission_time};
    pub use crate::error::SimError;
    pub use crate::generator::{GeneratorConfig, Interval, TrafficPattern};
    pub use crate::network::{LinkConfig, NodeId, NodeRole, Topology};
    pub use crate::simulation::{RunSummary, Scenario, ScenarioConfig};
    pub use crate::trace::{EntityId, Metric, Sample, TraceCollector};
}
