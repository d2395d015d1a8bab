use serde::{Deserialize, Serialize};

/// Bytes per flit, the atomic transfer unit on a CXL link.
pub const CXL_FLIT_SIZE_BYTES: u32 = 64;
/// PCIe Gen5 x16 link speed. 64 Gbps is numerically 64 bits per nanosecond.
pub const CXL_LINK_SPEED_GBPS: u64 = 64;
/// Fixed internal delay from switch ingress to the start of egress
/// transmission (cut-through), per hop.
pub const CXL_SWITCH_LATENCY_NS: u64 = 30;
/// Device-side processing delay before a response is issued.
pub const CXL_DEVICE_LATENCY_NS: u64 = 150;
/// Direct-attached DRAM latency, for comparison against fabric numbers.
/// Not used on the simulated path.
pub const LOCAL_DRAM_LATENCY_NS: u64 = 100;

/// Fabric-wide timing and link parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FabricConfig {
    pub switch_latency_ns: u64,
    pub device_latency_ns: u64,
    /// Link speed in Gbps; equals bits per nanosecond.
    pub link_speed_gbps: u64,
    pub flit_size_bytes: u32,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            switch_latency_ns: CXL_SWITCH_LATENCY_NS,
            device_latency_ns: CXL_DEVICE_LATENCY_NS,
            link_speed_gbps: CXL_LINK_SPEED_GBPS,
            flit_size_bytes: CXL_FLIT_SIZE_BYTES,
        }
    }
}

/// Partial form of [`FabricConfig`] used by scenario files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FabricConfigOverride {
    pub switch_latency_ns: Option<u64>,
    pub device_latency_ns: Option<u64>,
    pub link_speed_gbps: Option<u64>,
    pub flit_size_bytes: Option<u32>,
}

impl FabricConfigOverride {
    pub fn apply_to(&self, config: &mut FabricConfig) {
        if let Some(v) = self.switch_latency_ns {
            config.switch_latency_ns = v;
        }
        if let Some(v) = self.device_latency_ns {
            config.device_latency_ns = v;
        }
        if let Some(v) = self.link_speed_gbps {
            config.link_speed_gbps = v;
        }
        if let Some(v) = self.flit_size_bytes {
            config.flit_size_bytes = v;
        }
    }
}
