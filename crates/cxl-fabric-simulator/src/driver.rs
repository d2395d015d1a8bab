//! Binds the three canonical event kinds to handlers that walk a
//! [`Topology`], and seeds the scheduler from a workload trace.
//!
//! The driver is the only code that knows how the pieces connect: hosts
//! inject at their home switch, transmits forward hop by hop, device
//! responses close the loop into host bookkeeping and statistics.

use cxl_fabric_abstract::{Event, EventKind, Priority};

use crate::engine::{RunLimits, Scheduler, SimulationEngine};
use crate::error::SimError;
use crate::stats::SimStats;
use crate::topology::{Hop, Topology};
use crate::trace::FabricReport;
use crate::workload::MemoryRequest;

fn on_host_send(
    world: &mut Topology,
    sched: &mut Scheduler,
    event: &mut Event,
) -> Result<(), SimError> {
    let host_id = event.host_id.ok_or(SimError::MalformedEvent {
        kind: event.kind,
        field: "host_id",
    })?;
    let packet = event.packet.take().ok_or(SimError::MalformedEvent {
        kind: event.kind,
        field: "packet",
    })?;
    let (home, arrival_port) = match (
        world.host_to_switch.get(&host_id),
        world.host_arrival_port(host_id),
    ) {
        (Some(&home), Some(port)) => (home, port),
        _ => {
            return Err(SimError::MalformedEvent {
                kind: event.kind,
                field: "host_id",
            });
        }
    };

    sched.stats.record_send();
    let outcome = world.switches[home].ingress(packet, arrival_port, sched)?;
    if outcome.is_drop() {
        sched.stats.record_drop();
    }
    Ok(())
}

fn on_switch_transmit(
    world: &mut Topology,
    sched: &mut Scheduler,
    event: &mut Event,
) -> Result<(), SimError> {
    let switch_id = event.switch_id.ok_or(SimError::MalformedEvent {
        kind: event.kind,
        field: "switch_id",
    })?;
    let output_port = event.output_port.ok_or(SimError::MalformedEvent {
        kind: event.kind,
        field: "output_port",
    })?;

    let Some(mut packet) = world.switches[switch_id].egress(output_port, sched)? else {
        return Ok(());
    };
    let residual = world.switches[switch_id].ports[output_port].len();
    sched.stats.record_queue_depth(switch_id, sched.now(), residual);

    match world.next_hop(switch_id, output_port, packet.dst_device)? {
        Hop::Device => {
            // The device turns the request around after its processing
            // delay.
            packet.kind = packet.kind.response();
            let response_at = sched.now() + world.config.device_latency_ns;
            sched.schedule(Event::device_response(response_at, packet))?;
        }
        Hop::Switch {
            switch,
            arrival_port,
        } => {
            let outcome = world.switches[switch].ingress(packet, arrival_port, sched)?;
            if outcome.is_drop() {
                sched.stats.record_drop();
            }
        }
    }
    Ok(())
}

fn on_device_response(
    world: &mut Topology,
    sched: &mut Scheduler,
    event: &mut Event,
) -> Result<(), SimError> {
    let packet = event.packet.take().ok_or(SimError::MalformedEvent {
        kind: event.kind,
        field: "packet",
    })?;
    if let Some(host) = world.hosts.get_mut(packet.src_host) {
        host.receive_response(&packet);
    }
    sched.stats.record_completion(&packet, sched.now());
    Ok(())
}

/// Register the conformant handler for each of the three event kinds.
pub fn register_fabric_handlers(engine: &mut SimulationEngine<Topology>) {
    engine.register(EventKind::HostSend, Box::new(on_host_send));
    engine.register(EventKind::SwitchTransmit, Box::new(on_switch_transmit));
    engine.register(EventKind::DeviceResponse, Box::new(on_device_response));
}

/// Turn a workload trace into packets (owned by their issuing hosts) and
/// the initial host_send events.
pub fn seed_requests(
    sched: &mut Scheduler,
    topology: &mut Topology,
    requests: &[MemoryRequest],
) -> Result<(), SimError> {
    let num_hosts = topology.hosts.len();
    for request in requests {
        let host = topology.hosts.get_mut(request.host_id).ok_or_else(|| {
            SimError::InvalidTopology(format!(
                "workload references host {} but the topology has {num_hosts} hosts",
                request.host_id,
            ))
        })?;
        let packet = host.create_request(
            request.device_id,
            request.address,
            request.is_read,
            Priority::Medium,
            request.timestamp,
        );
        sched.schedule(Event::host_send(request.timestamp, packet, request.host_id))?;
    }
    Ok(())
}

/// A wired-up simulation: topology plus an engine with the fabric handlers
/// registered. What examples, scenarios, and the CLI drive.
pub struct FabricSim {
    pub topology: Topology,
    engine: SimulationEngine<Topology>,
}

impl FabricSim {
    pub fn new(topology: Topology) -> Self {
        let mut engine = SimulationEngine::new();
        register_fabric_handlers(&mut engine);
        Self { topology, engine }
    }

    /// Schedule the initial host_send events for a workload trace.
    pub fn seed(&mut self, requests: &[MemoryRequest]) -> Result<(), SimError> {
        seed_requests(&mut self.engine.scheduler, &mut self.topology, requests)
    }

    pub fn run(&mut self, limits: RunLimits) -> Result<(), SimError> {
        self.engine.run(&mut self.topology, limits)
    }

    /// Drain the event queue completely.
    pub fn run_to_completion(&mut self) -> Result<(), SimError> {
        self.run(RunLimits::default())
    }

    pub fn stats(&self) -> &SimStats {
        self.engine.stats()
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.engine.scheduler
    }

    pub fn report(&self) -> FabricReport {
        FabricReport::collect(self.stats(), &self.topology)
    }
}
