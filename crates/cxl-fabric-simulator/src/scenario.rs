use cxl_fabric_abstract::FabricConfigOverride;
use serde::Deserialize;

use crate::topology::TopologySpec;
use crate::workload::WorkloadSpec;

/// A declarative simulation run: topology, workload, limits, and the
/// assertions its results must satisfy. Stored as TOML under `scenarios/`.
#[derive(Debug, Clone, Deserialize)]
pub struct FabricScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub topology: TopologySpec,
    pub workload: WorkloadSpec,
    pub traffic: TrafficSpec,
    #[serde(default)]
    pub config: FabricConfigOverride,
    #[serde(default)]
    pub run: RunSpec,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

/// How much traffic the workload generates.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TrafficSpec {
    pub requests_per_host: usize,
    pub duration_ns: u64,
    /// Workload RNG seed; identical seeds reproduce runs bit for bit.
    #[serde(default)]
    pub seed: u64,
}

/// Optional stopping conditions; an absent field means unbounded.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RunSpec {
    pub until: Option<u64>,
    pub max_events: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Completed-packet count must lie within [min, max].
    PacketsReceived { min: u64, max: Option<u64> },
    /// Drop count must lie within [min, max].
    PacketsDropped { min: u64, max: Option<u64> },
    /// Mean end-to-end latency stays under the bound.
    AvgLatencyBelow { ns: f64 },
    /// 99th percentile latency stays under the bound.
    P99LatencyBelow { ns: u64 },
    /// The run finishes (or halts) no later than this virtual time.
    MaxFinalTime { ns: u64 },
}
