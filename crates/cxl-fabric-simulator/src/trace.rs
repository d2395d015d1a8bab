use cxl_fabric_abstract::{HostId, SwitchId};
use serde::Serialize;
use tracing::info;

use crate::stats::SimStats;
use crate::topology::Topology;

/// Snapshot of one output port at collection time.
#[derive(Debug, Clone, Serialize)]
pub struct PortReport {
    pub port: usize,
    pub queued: usize,
    pub capacity: usize,
    pub sent: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwitchReport {
    pub switch: SwitchId,
    pub processed: u64,
    pub dropped: u64,
    pub drop_rate: f64,
    pub avg_occupancy: f64,
    pub ports: Vec<PortReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostReport {
    pub host: HostId,
    pub sent: u64,
    pub received: u64,
    pub outstanding: usize,
}

/// Serializable summary of a finished (or halted) run.
#[derive(Debug, Clone, Serialize)]
pub struct FabricReport {
    pub final_time_ns: u64,
    pub total_events: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub avg_latency_ns: f64,
    pub p50_latency_ns: u64,
    pub p99_latency_ns: u64,
    pub switches: Vec<SwitchReport>,
    pub hosts: Vec<HostReport>,
}

impl FabricReport {
    pub fn collect(stats: &SimStats, topology: &Topology) -> Self {
        let switches = topology
            .switches
            .iter()
            .map(|sw| SwitchReport {
                switch: sw.id,
                processed: sw.processed,
                dropped: sw.dropped,
                drop_rate: sw.dropped as f64 / sw.processed.max(1) as f64,
                avg_occupancy: sw.avg_occupancy(),
                ports: sw
                    .ports
                    .iter()
                    .map(|port| PortReport {
                        port: port.id,
                        queued: port.len(),
                        capacity: port.capacity(),
                        sent: port.sent,
                        dropped: port.dropped,
                    })
                    .collect(),
            })
            .collect();
        let hosts = topology
            .hosts
            .iter()
            .map(|host| HostReport {
                host: host.id,
                sent: host.sent,
                received: host.received,
                outstanding: host.num_outstanding(),
            })
            .collect();

        Self {
            final_time_ns: stats.final_time,
            total_events: stats.total_events,
            packets_sent: stats.packets_sent,
            packets_received: stats.packets_received,
            packets_dropped: stats.packets_dropped,
            avg_latency_ns: stats.avg_latency(),
            p50_latency_ns: stats.percentile_latency(50.0),
            p99_latency_ns: stats.percentile_latency(99.0),
            switches,
            hosts,
        }
    }

    /// Emit the run summary through tracing.
    pub fn log_summary(&self) {
        info!(
            total_events = self.total_events,
            final_time_ns = self.final_time_ns,
            packets_sent = self.packets_sent,
            packets_received = self.packets_received,
            packets_dropped = self.packets_dropped,
            "simulation finished"
        );
        if self.packets_received > 0 {
            info!(
                avg_latency_ns = self.avg_latency_ns,
                p50_latency_ns = self.p50_latency_ns,
                p99_latency_ns = self.p99_latency_ns,
                "latency"
            );
        }
        for sw in &self.switches {
            info!(
                switch = sw.switch,
                processed = sw.processed,
                dropped = sw.dropped,
                drop_rate = sw.drop_rate,
                avg_occupancy = sw.avg_occupancy,
                "switch status"
            );
        }
    }
}
