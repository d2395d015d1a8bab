use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use cxl_fabric_simulator::{
    FabricReport, FabricSim, RunLimits, TopologySpec, UplinkPolicy, WorkloadSpec, scenario_runner,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "CXL memory-fabric discrete-event simulator")]
struct Args {
    /// Run a scenario file (TOML) with its assertions.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Topology kind when building from flags.
    #[arg(long, value_enum, default_value_t = TopologyKind::Single)]
    topology: TopologyKind,

    /// Hosts for the single-tier topology.
    #[arg(long, default_value_t = 2)]
    hosts: usize,
    /// Devices for the single-tier topology.
    #[arg(long, default_value_t = 2)]
    devices: usize,

    #[arg(long, default_value_t = 2)]
    spines: usize,
    #[arg(long, default_value_t = 3)]
    leaves: usize,
    #[arg(long, default_value_t = 2)]
    hosts_per_leaf: usize,
    #[arg(long, default_value_t = 1)]
    devices_per_leaf: usize,
    /// Host-leaf uplink selection for the two-tier topology.
    #[arg(long, value_enum, default_value_t = UplinkKind::SpineZero)]
    uplink_policy: UplinkKind,

    /// Output-queue capacity per switch port, in packets.
    #[arg(long, default_value_t = 32)]
    queue_depth: usize,

    #[arg(long, value_enum, default_value_t = WorkloadKind::Uniform)]
    workload: WorkloadKind,
    /// Zipf exponent for the zipfian workload.
    #[arg(long, default_value_t = 1.0)]
    alpha: f64,
    #[arg(long, default_value_t = 0)]
    hotspot_device: usize,
    #[arg(long, default_value_t = 0.8)]
    hotspot_fraction: f64,
    #[arg(long, default_value_t = 10)]
    burst_size: usize,
    #[arg(long, default_value_t = 1000)]
    burst_interval_ns: u64,
    #[arg(long, default_value_t = 64)]
    stride: u64,

    #[arg(long, default_value_t = 100)]
    requests_per_host: usize,
    #[arg(long, default_value_t = 10_000)]
    duration_ns: u64,
    /// Workload RNG seed; identical seeds reproduce runs bit for bit.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Stop the simulation clock at this virtual time (ns).
    #[arg(long)]
    until: Option<u64>,
    /// Stop after dispatching this many events.
    #[arg(long)]
    max_events: Option<u64>,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TopologyKind {
    Single,
    TwoTier,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum UplinkKind {
    SpineZero,
    RoundRobin,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WorkloadKind {
    Uniform,
    Zipfian,
    Hotspot,
    Bursty,
    Sequential,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let report = if let Some(path) = &args.scenario {
        scenario_runner::run_scenario(path)?
    } else {
        run_from_flags(&args)?
    };
    report.log_summary();

    if let Some(path) = &args.trace_out {
        write_trace(path, &report)?;
    }
    Ok(())
}

fn run_from_flags(args: &Args) -> Result<FabricReport> {
    let topology_spec = args.topology_spec();
    let workload_spec = args.workload_spec();

    let topology = topology_spec.build().context("Failed to build topology")?;
    let num_hosts = topology.hosts.len();
    let num_devices = topology.devices.len();

    let mut rng = StdRng::seed_from_u64(args.seed);
    let requests = workload_spec.generate(
        num_hosts,
        num_devices,
        args.duration_ns,
        args.requests_per_host,
        &mut rng,
    );
    info!(
        hosts = num_hosts,
        devices = num_devices,
        requests = requests.len(),
        "starting simulation"
    );

    let mut sim = FabricSim::new(topology);
    sim.seed(&requests)?;
    sim.run(RunLimits {
        until: args.until,
        max_events: args.max_events,
    })?;
    Ok(sim.report())
}

impl Args {
    fn topology_spec(&self) -> TopologySpec {
        match self.topology {
            TopologyKind::Single => TopologySpec::Single {
                num_hosts: self.hosts,
                num_devices: self.devices,
                queue_depth: self.queue_depth,
            },
            TopologyKind::TwoTier => TopologySpec::TwoTier {
                num_spines: self.spines,
                num_leaves: self.leaves,
                hosts_per_leaf: self.hosts_per_leaf,
                devices_per_leaf: self.devices_per_leaf,
                queue_depth: self.queue_depth,
                uplink_policy: match self.uplink_policy {
                    UplinkKind::SpineZero => UplinkPolicy::SpineZero,
                    UplinkKind::RoundRobin => UplinkPolicy::RoundRobin,
                },
            },
        }
    }

    fn workload_spec(&self) -> WorkloadSpec {
        match self.workload {
            WorkloadKind::Uniform => WorkloadSpec::Uniform,
            WorkloadKind::Zipfian => WorkloadSpec::Zipfian {
                alpha: self.alpha,
                hot_device_fraction: 0.2,
            },
            WorkloadKind::Hotspot => WorkloadSpec::Hotspot {
                hotspot_device: self.hotspot_device,
                hotspot_fraction: self.hotspot_fraction,
            },
            WorkloadKind::Bursty => WorkloadSpec::Bursty {
                burst_size: self.burst_size,
                burst_interval_ns: self.burst_interval_ns,
            },
            WorkloadKind::Sequential => WorkloadSpec::Sequential {
                stride: self.stride,
            },
        }
    }
}

fn write_trace(path: &Path, report: &FabricReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
