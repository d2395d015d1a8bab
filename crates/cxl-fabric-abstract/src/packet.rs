use serde::{Deserialize, Serialize};

/// Identifies a compute host in the fabric.
pub type HostId = usize;
/// Identifies a CXL memory device in the fabric.
pub type DeviceId = usize;
/// Identifies a fabric switch.
pub type SwitchId = usize;

/// Unique packet identifier. The high 32 bits carry the issuing host id and
/// the low 32 bits its per-host sequence number, so ids stay unique across
/// the whole run while each host keeps an independent counter.
pub type PacketId = u64;

/// Compose a packet id from a host id and that host's sequence number.
pub fn packet_id(host: HostId, seq: u32) -> PacketId {
    ((host as u64) << 32) | seq as u64
}

/// CXL.mem transaction types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketKind {
    /// Memory read request
    MemRead,
    /// Memory write request
    MemWrite,
    /// Read response with data
    MemReadResp,
    /// Write acknowledgment
    MemWriteAck,
}

impl PacketKind {
    pub fn is_request(&self) -> bool {
        matches!(self, PacketKind::MemRead | PacketKind::MemWrite)
    }

    /// The completion kind a device answers this transaction with.
    /// Responses map to themselves.
    pub fn response(self) -> PacketKind {
        match self {
            PacketKind::MemRead => PacketKind::MemReadResp,
            PacketKind::MemWrite => PacketKind::MemWriteAck,
            other => other,
        }
    }
}

/// QoS priority levels. Carried on every packet but routing-inert: the base
/// fabric queues strictly FIFO per output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// A single CXL transaction in flight through the fabric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    /// Unique identifier within the run
    pub id: PacketId,
    /// Transaction type (read/write/response)
    pub kind: PacketKind,
    /// Issuing host
    pub src_host: HostId,
    /// Target CXL memory device
    pub dst_device: DeviceId,
    /// Memory address being accessed (opaque to the fabric)
    pub address: u64,
    /// Transfer size in bytes, typically one 64 B cache line
    pub size_bytes: u32,
    /// QoS priority level
    pub priority: Priority,
    /// Creation timestamp at the issuing host (ns)
    pub created_at: u64,
    /// Switch ids appended as the packet egresses each switch
    pub route: Vec<SwitchId>,
}

impl Packet {
    pub fn new(
        id: PacketId,
        kind: PacketKind,
        src_host: HostId,
        dst_device: DeviceId,
        address: u64,
        priority: Priority,
        created_at: u64,
    ) -> Self {
        Self {
            id,
            kind,
            src_host,
            dst_device,
            address,
            size_bytes: crate::config::CXL_FLIT_SIZE_BYTES,
            priority,
            created_at,
            route: Vec::new(),
        }
    }

    /// End-to-end latency as observed at `now`.
    pub fn latency_at(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }
}
