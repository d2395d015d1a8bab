//! Smallest useful fabric: two hosts and two CXL devices behind one switch,
//! under seeded uniform traffic.

use anyhow::Result;
use cxl_fabric_simulator::{FabricSim, RunLimits, TopologySpec, WorkloadSpec};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let topology = TopologySpec::Single {
        num_hosts: 2,
        num_devices: 2,
        queue_depth: 16,
    }
    .build()?;

    let mut rng = StdRng::seed_from_u64(42);
    let requests = WorkloadSpec::Uniform.generate(2, 2, 10_000, 100, &mut rng);
    info!(requests = requests.len(), "seeding uniform traffic");

    let mut sim = FabricSim::new(topology);
    sim.seed(&requests)?;
    sim.run(RunLimits::until(20_000))?;

    sim.report().log_summary();
    Ok(())
}
