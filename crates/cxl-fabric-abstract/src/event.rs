use crate::packet::{HostId, Packet, SwitchId};

/// The fixed set of event kinds the kernel dispatches on. The contract with
/// any driver is exactly these three; unknown kinds are unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A host injects a fresh request into the fabric. `packet` and
    /// `host_id` are set.
    HostSend,
    /// An output port finishes serializing its head packet. `switch_id` and
    /// `output_port` are set; the switch dequeues at handler time.
    SwitchTransmit,
    /// A memory device completes a request. `packet` is the completed
    /// request.
    DeviceResponse,
}

impl EventKind {
    pub const COUNT: usize = 3;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// A scheduled occurrence in virtual time.
///
/// Events do not order themselves; the scheduler keys its heap on
/// `(timestamp, insertion sequence)` so ties dispatch in schedule order.
#[derive(Debug, Clone)]
pub struct Event {
    /// When this event fires (ns)
    pub timestamp: u64,
    pub kind: EventKind,
    /// Payload packet, if this kind carries one. Handlers take it out to
    /// transfer ownership onward.
    pub packet: Option<Packet>,
    pub switch_id: Option<SwitchId>,
    pub output_port: Option<usize>,
    pub host_id: Option<HostId>,
}

impl Event {
    pub fn host_send(timestamp: u64, packet: Packet, host_id: HostId) -> Self {
        Self {
            timestamp,
            kind: EventKind::HostSend,
            packet: Some(packet),
            switch_id: None,
            output_port: None,
            host_id: Some(host_id),
        }
    }

    pub fn switch_transmit(timestamp: u64, switch_id: SwitchId, output_port: usize) -> Self {
        Self {
            timestamp,
            kind: EventKind::SwitchTransmit,
            packet: None,
            switch_id: Some(switch_id),
            output_port: Some(output_port),
            host_id: None,
        }
    }

    pub fn device_response(timestamp: u64, packet: Packet) -> Self {
        Self {
            timestamp,
            kind: EventKind::DeviceResponse,
            packet: Some(packet),
            switch_id: None,
            output_port: None,
            host_id: None,
        }
    }
}
