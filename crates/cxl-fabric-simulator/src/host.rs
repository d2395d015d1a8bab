use std::collections::HashSet;

use cxl_fabric_abstract::packet::packet_id;
use cxl_fabric_abstract::{DeviceId, HostId, Packet, PacketId, PacketKind, Priority, SwitchId};

/// A compute host issuing CXL memory requests and absorbing responses.
#[derive(Debug)]
pub struct Host {
    pub id: HostId,
    /// Switch this host is directly attached to.
    pub home_switch: SwitchId,
    next_packet_seq: u32,
    pub sent: u64,
    pub received: u64,
    /// Responses whose id was not outstanding. Tolerated, only counted.
    pub unknown_responses: u64,
    outstanding: HashSet<PacketId>,
}

impl Host {
    pub fn new(id: HostId, home_switch: SwitchId) -> Self {
        Self {
            id,
            home_switch,
            next_packet_seq: 0,
            sent: 0,
            received: 0,
            unknown_responses: 0,
            outstanding: HashSet::new(),
        }
    }

    /// Build a fresh request packet and track it as outstanding.
    pub fn create_request(
        &mut self,
        dst_device: DeviceId,
        address: u64,
        is_read: bool,
        priority: Priority,
        timestamp: u64,
    ) -> Packet {
        let kind = if is_read {
            PacketKind::MemRead
        } else {
            PacketKind::MemWrite
        };
        let id = packet_id(self.id, self.next_packet_seq);
        self.next_packet_seq += 1;
        self.sent += 1;
        self.outstanding.insert(id);
        Packet::new(id, kind, self.id, dst_device, address, priority, timestamp)
    }

    /// Absorb a response. Unknown ids are accepted silently.
    pub fn receive_response(&mut self, packet: &Packet) {
        self.received += 1;
        if !self.outstanding.remove(&packet.id) {
            self.unknown_responses += 1;
        }
    }

    /// Number of in-flight requests.
    pub fn num_outstanding(&self) -> usize {
        self.outstanding.len()
    }
}
