use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use cxl_fabric_abstract::FabricConfig;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use crate::driver::FabricSim;
use crate::engine::RunLimits;
use crate::scenario::{FabricScenario, TestAssertion};
use crate::trace::FabricReport;

/// Load a scenario file, run it, and verify its assertions.
pub fn run_scenario(path: impl AsRef<Path>) -> Result<FabricReport> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    let scenario: FabricScenario =
        toml::from_str(&content).context("Failed to parse scenario file")?;
    run(&scenario)
}

/// Run an already-parsed scenario.
pub fn run(scenario: &FabricScenario) -> Result<FabricReport> {
    let mut config = FabricConfig::default();
    scenario.config.apply_to(&mut config);

    let topology = scenario
        .topology
        .build_with(&config)
        .context("Failed to build topology")?;
    let num_hosts = topology.hosts.len();
    let num_devices = topology.devices.len();

    let mut rng = StdRng::seed_from_u64(scenario.traffic.seed);
    let requests = scenario.workload.generate(
        num_hosts,
        num_devices,
        scenario.traffic.duration_ns,
        scenario.traffic.requests_per_host,
        &mut rng,
    );

    info!(
        name = %scenario.name,
        hosts = num_hosts,
        devices = num_devices,
        requests = requests.len(),
        "running scenario"
    );

    let mut sim = FabricSim::new(topology);
    sim.seed(&requests)?;
    sim.run(RunLimits {
        until: scenario.run.until,
        max_events: scenario.run.max_events,
    })?;

    let report = sim.report();
    for assertion in &scenario.assertions {
        check(assertion, &report)
            .with_context(|| format!("Scenario '{}' failed an assertion", scenario.name))?;
    }
    Ok(report)
}

fn check(assertion: &TestAssertion, report: &FabricReport) -> Result<()> {
    match *assertion {
        TestAssertion::PacketsReceived { min, max } => {
            let got = report.packets_received;
            if got < min || max.is_some_and(|max| got > max) {
                bail!("packets_received = {got}, expected at least {min} (max {max:?})");
            }
        }
        TestAssertion::PacketsDropped { min, max } => {
            let got = report.packets_dropped;
            if got < min || max.is_some_and(|max| got > max) {
                bail!("packets_dropped = {got}, expected at least {min} (max {max:?})");
            }
        }
        TestAssertion::AvgLatencyBelow { ns } => {
            if report.avg_latency_ns >= ns {
                bail!(
                    "avg latency {:.2} ns exceeds bound {ns} ns",
                    report.avg_latency_ns
                );
            }
        }
        TestAssertion::P99LatencyBelow { ns } => {
            if report.p99_latency_ns >= ns {
                bail!("p99 latency {} ns exceeds bound {ns} ns", report.p99_latency_ns);
            }
        }
        TestAssertion::MaxFinalTime { ns } => {
            if report.final_time_ns > ns {
                bail!("run ended at {} ns, after the {ns} ns deadline", report.final_time_ns);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASELINE: &str = r#"
name = "uniform baseline"
description = "one switch, light uniform load"

[topology]
kind = "single"
num_hosts = 2
num_devices = 2
queue_depth = 16

[workload]
kind = "uniform"

[traffic]
requests_per_host = 20
duration_ns = 10000
seed = 42

[[assertions]]
type = "packets_received"
min = 1

[[assertions]]
type = "avg_latency_below"
ns = 100000.0
"#;

    #[test]
    fn baseline_scenario_passes_its_assertions() {
        let scenario: FabricScenario = toml::from_str(BASELINE).unwrap();
        let report = run(&scenario).unwrap();
        assert_eq!(report.packets_sent, 40);
        assert!(report.packets_received >= 1);
    }

    #[test]
    fn violated_assertion_fails_with_context() {
        let mut scenario: FabricScenario = toml::from_str(BASELINE).unwrap();
        scenario.assertions = vec![TestAssertion::PacketsDropped { min: 1_000, max: None }];
        let err = run(&scenario).unwrap_err();
        assert!(format!("{err:#}").contains("packets_dropped"));
    }

    #[test]
    fn identical_seeds_reproduce_reports() {
        let scenario: FabricScenario = toml::from_str(BASELINE).unwrap();
        let a = run(&scenario).unwrap();
        let b = run(&scenario).unwrap();
        assert_eq!(a.packets_received, b.packets_received);
        assert_eq!(a.avg_latency_ns, b.avg_latency_ns);
        assert_eq!(a.total_events, b.total_events);
    }
}
