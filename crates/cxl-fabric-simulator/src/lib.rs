pub mod driver;
pub mod engine;
pub mod error;
pub mod host;
pub mod scenario;
pub mod scenario_runner;
pub mod stats;
pub mod switch;
pub mod topology;
pub mod trace;
pub mod workload;

pub use driver::{FabricSim, register_fabric_handlers, seed_requests};
pub use engine::{Handler, RunLimits, Scheduler, SimulationEngine};
pub use error::SimError;
pub use host::Host;
pub use scenario::FabricScenario;
pub use stats::SimStats;
pub use switch::{IngressOutcome, Port, Switch};
pub use topology::{Hop, Link, Topology, TopologySpec, UplinkPolicy};
pub use trace::FabricReport;
pub use workload::{MemoryRequest, WorkloadSpec};
