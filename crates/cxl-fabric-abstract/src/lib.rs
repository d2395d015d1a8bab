pub mod config;
pub mod event;
pub mod packet;

pub use config::{FabricConfig, FabricConfigOverride};
pub use event::{Event, EventKind};
pub use packet::{DeviceId, HostId, Packet, PacketId, PacketKind, Priority, SwitchId};

pub use config::{
    CXL_DEVICE_LATENCY_NS, CXL_FLIT_SIZE_BYTES, CXL_LINK_SPEED_GBPS, CXL_SWITCH_LATENCY_NS,
    LOCAL_DRAM_LATENCY_NS,
};
