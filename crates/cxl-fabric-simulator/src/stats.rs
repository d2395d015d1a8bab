use std::collections::HashMap;

use cxl_fabric_abstract::{Packet, SwitchId};
use serde::Serialize;

/// Simulation-wide statistics, collected by the kernel and the driver as a
/// run progresses.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimStats {
    /// Events dispatched, accumulated across successive `run` calls.
    pub total_events: u64,
    /// Virtual clock at the end of the most recent `run` call (ns).
    pub final_time: u64,
    /// Requests injected into the fabric (counted at host_send dispatch).
    pub packets_sent: u64,
    /// Requests that completed with a device response.
    pub packets_received: u64,
    /// Requests dropped anywhere in the fabric (unroutable or queue-full).
    pub packets_dropped: u64,
    /// Per-completed-packet end-to-end latency, in completion order (ns).
    pub latencies: Vec<u64>,
    /// Residual output-queue depth samples per switch: (time, depth).
    pub queue_depths: HashMap<SwitchId, Vec<(u64, usize)>>,
}

impl SimStats {
    pub fn record_completion(&mut self, packet: &Packet, completion_time: u64) {
        self.packets_received += 1;
        self.latencies.push(packet.latency_at(completion_time));
    }

    pub fn record_send(&mut self) {
        self.packets_sent += 1;
    }

    pub fn record_drop(&mut self) {
        self.packets_dropped += 1;
    }

    pub fn record_queue_depth(&mut self, switch: SwitchId, time: u64, depth: usize) {
        self.queue_depths.entry(switch).or_default().push((time, depth));
    }

    /// Mean end-to-end latency; 0.0 when nothing completed.
    pub fn avg_latency(&self) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        self.latencies.iter().sum::<u64>() as f64 / self.latencies.len() as f64
    }

    /// p-th percentile latency (p in [0, 100]); 0 when nothing completed.
    ///
    /// Index is `floor(n * p / 100)` into the sorted latencies, clamped to
    /// the last element.
    pub fn percentile_latency(&self, p: f64) -> u64 {
        if self.latencies.is_empty() {
            return 0;
        }
        let mut sorted = self.latencies.clone();
        sorted.sort_unstable();
        let idx = (sorted.len() as f64 * p / 100.0) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }
}
