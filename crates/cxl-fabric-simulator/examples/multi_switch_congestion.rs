//! Two-tier spine-leaf fabric under a hotspot: all four hosts hammer device
//! 0, and the spine-0-only uplink policy concentrates the damage on one
//! egress port.

use anyhow::Result;
use cxl_fabric_simulator::{FabricSim, MemoryRequest, RunLimits, TopologySpec};
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let topology = TopologySpec::TwoTier {
        num_spines: 2,
        num_leaves: 3,
        hosts_per_leaf: 2,
        devices_per_leaf: 1,
        queue_depth: 16,
        uplink_policy: Default::default(),
    }
    .build()?;
    let num_hosts = topology.hosts.len();
    info!(
        switches = topology.switches.len(),
        hosts = num_hosts,
        devices = topology.devices.len(),
        links = topology.switch_links.len(),
        "built two-tier topology"
    );

    // 50 requests per host over 5 us, every one aimed at device 0.
    let mut requests = Vec::new();
    for host_id in 0..num_hosts {
        for i in 0..50u64 {
            requests.push(MemoryRequest {
                timestamp: i * 100,
                host_id,
                device_id: 0,
                address: 0x1000 * i,
                is_read: true,
            });
        }
    }

    let mut sim = FabricSim::new(topology);
    sim.seed(&requests)?;
    sim.run(RunLimits::until(20_000))?;

    let report = sim.report();
    report.log_summary();

    for sw in &report.switches {
        if sw.dropped > 0 {
            info!(
                switch = sw.switch,
                dropped = sw.dropped,
                "congestion drop location"
            );
        }
    }
    Ok(())
}
