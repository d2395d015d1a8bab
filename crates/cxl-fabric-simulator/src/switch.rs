use std::collections::{HashMap, VecDeque};

use cxl_fabric_abstract::{DeviceId, Event, FabricConfig, Packet, SwitchId};
use tracing::warn;

use crate::engine::Scheduler;
use crate::error::SimError;

/// A single output lane with bounded buffering and serialization delay.
///
/// The port is a pure data structure: it never schedules events. The owning
/// switch decides when a queued packet starts and finishes transmitting.
#[derive(Debug)]
pub struct Port {
    pub id: usize,
    capacity: usize,
    /// Link speed in bits per nanosecond (numerically Gbps).
    bandwidth_bits_per_ns: u64,
    queue: VecDeque<Packet>,
    pub sent: u64,
    pub dropped: u64,
    /// True iff exactly one switch_transmit event for this port is pending.
    pub transmitting: bool,
    /// Instant at which the link finishes its current transmission (ns).
    pub next_free: u64,
}

impl Port {
    pub fn new(id: usize, capacity: usize, bandwidth_bits_per_ns: u64) -> Self {
        Self {
            id,
            capacity,
            bandwidth_bits_per_ns,
            queue: VecDeque::new(),
            sent: 0,
            dropped: 0,
            transmitting: false,
            next_free: 0,
        }
    }

    /// Append a packet, or drop it when the queue is at capacity. No timing
    /// side effects either way.
    pub fn enqueue(&mut self, packet: Packet) -> bool {
        if self.queue.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.queue.push_back(packet);
        true
    }

    /// Remove and return the head packet.
    pub fn dequeue(&mut self) -> Option<Packet> {
        let packet = self.queue.pop_front()?;
        self.sent += 1;
        Some(packet)
    }

    pub fn peek(&self) -> Option<&Packet> {
        self.queue.front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn has_packets(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queue occupancy as a fraction of capacity.
    pub fn occupancy(&self) -> f64 {
        self.queue.len() as f64 / self.capacity as f64
    }

    /// Time to push `size_bytes` onto the wire at this port's bandwidth.
    pub fn serialization_delay_ns(&self, size_bytes: u32) -> u64 {
        (size_bytes as u64 * 8).div_ceil(self.bandwidth_bits_per_ns)
    }
}

/// Result of offering a packet to a switch. Drops are modeled outcomes, not
/// errors: the caller sees them immediately and statistics count them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngressOutcome {
    Enqueued,
    DroppedUnroutable,
    DroppedQueueFull,
}

impl IngressOutcome {
    pub fn is_drop(&self) -> bool {
        !matches!(self, IngressOutcome::Enqueued)
    }
}

/// A CXL fabric switch: output-queued ports plus a destination-device
/// routing table.
///
/// Ingress runs synchronously so drops are visible to the caller; actual
/// transmission is a scheduled event so simultaneous arrivals on one output
/// port queue up instead of collapsing into instantaneous delivery. At most
/// one switch_transmit event is pending per port: the event fires when the
/// head packet has fully serialized, and egress re-arms the port only if
/// more packets remain.
#[derive(Debug)]
pub struct Switch {
    pub id: SwitchId,
    pub ports: Vec<Port>,
    routes: HashMap<DeviceId, usize>,
    latency_ns: u64,
    pub processed: u64,
    pub dropped: u64,
}

impl Switch {
    pub fn new(id: SwitchId, num_ports: usize, queue_depth: usize, config: &FabricConfig) -> Self {
        let ports = (0..num_ports)
            .map(|p| Port::new(p, queue_depth, config.link_speed_gbps))
            .collect();
        Self {
            id,
            ports,
            routes: HashMap::new(),
            latency_ns: config.switch_latency_ns,
            processed: 0,
            dropped: 0,
        }
    }

    pub fn num_ports(&self) -> usize {
        self.ports.len()
    }

    /// Install a routing table entry.
    pub fn set_route(&mut self, dst_device: DeviceId, output_port: usize) -> Result<(), SimError> {
        if output_port >= self.ports.len() {
            return Err(SimError::InvalidPort {
                switch: self.id,
                port: output_port,
                num_ports: self.ports.len(),
            });
        }
        self.routes.insert(dst_device, output_port);
        Ok(())
    }

    pub fn route_for(&self, dst_device: DeviceId) -> Option<usize> {
        self.routes.get(&dst_device).copied()
    }

    /// Accept a packet arriving on `arrival_port`, route it to its output
    /// queue, and arm the port if it was idle.
    pub fn ingress(
        &mut self,
        packet: Packet,
        arrival_port: usize,
        sched: &mut Scheduler,
    ) -> Result<IngressOutcome, SimError> {
        if arrival_port >= self.ports.len() {
            return Err(SimError::InvalidPort {
                switch: self.id,
                port: arrival_port,
                num_ports: self.ports.len(),
            });
        }
        self.processed += 1;

        let Some(output_port) = self.route_for(packet.dst_device) else {
            warn!(
                switch = self.id,
                device = packet.dst_device,
                packet = packet.id,
                "no route for device, dropping packet"
            );
            self.dropped += 1;
            return Ok(IngressOutcome::DroppedUnroutable);
        };

        let was_idle = {
            let port = &self.ports[output_port];
            port.is_empty() && !port.transmitting
        };
        if !self.ports[output_port].enqueue(packet) {
            self.dropped += 1;
            return Ok(IngressOutcome::DroppedQueueFull);
        }
        // A busy port already has its transmit event in flight; scheduling a
        // second one would let the port exceed one packet per serialization
        // window.
        if was_idle {
            self.schedule_transmit(output_port, sched)?;
        }
        Ok(IngressOutcome::Enqueued)
    }

    /// Arm `output_port`: pick the instant its head packet finishes
    /// serializing and schedule the matching switch_transmit event.
    ///
    /// The head byte leaves `latency_ns` after now (cut-through delay), but
    /// never before the link is free from the previous transmission; the
    /// event fires once the last byte is on the wire.
    fn schedule_transmit(&mut self, output_port: usize, sched: &mut Scheduler) -> Result<(), SimError> {
        let latency_ns = self.latency_ns;
        let port = &mut self.ports[output_port];
        let Some(head) = port.peek() else {
            port.transmitting = false;
            return Ok(());
        };
        let serialization = port.serialization_delay_ns(head.size_bytes);
        let tx_start = (sched.now() + latency_ns).max(port.next_free);
        let tx_done = tx_start + serialization;
        port.transmitting = true;
        port.next_free = tx_done;
        sched.schedule(Event::switch_transmit(tx_done, self.id, output_port))
    }

    /// Complete the pending transmission on `output_port`: dequeue the head
    /// packet, stamp this switch into its route, and re-arm the port if
    /// packets remain. Returns the packet for the driver to forward.
    pub fn egress(
        &mut self,
        output_port: usize,
        sched: &mut Scheduler,
    ) -> Result<Option<Packet>, SimError> {
        if output_port >= self.ports.len() {
            return Err(SimError::InvalidPort {
                switch: self.id,
                port: output_port,
                num_ports: self.ports.len(),
            });
        }
        let Some(mut packet) = self.ports[output_port].dequeue() else {
            self.ports[output_port].transmitting = false;
            return Ok(None);
        };
        packet.route.push(self.id);

        if self.ports[output_port].has_packets() {
            self.schedule_transmit(output_port, sched)?;
        } else {
            self.ports[output_port].transmitting = false;
        }
        Ok(Some(packet))
    }

    /// Mean occupancy across all output queues, as sampled right now.
    pub fn avg_occupancy(&self) -> f64 {
        if self.ports.is_empty() {
            return 0.0;
        }
        self.ports.iter().map(Port::occupancy).sum::<f64>() / self.ports.len() as f64
    }
}
