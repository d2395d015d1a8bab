use cxl_fabric_abstract::{DeviceId, HostId};
use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Per-device address space the generators draw from (1 GiB).
const ADDRESS_SPACE: u64 = 1 << 30;
/// Page granularity of the Zipfian address map.
const ZIPF_PAGES: usize = 1000;

/// A single memory request the workload asks a host to issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryRequest {
    /// Issue time (ns)
    pub timestamp: u64,
    pub host_id: HostId,
    pub device_id: DeviceId,
    pub address: u64,
    pub is_read: bool,
}

fn default_alpha() -> f64 {
    1.0
}
fn default_hot_device_fraction() -> f64 {
    0.2
}
fn default_hotspot_fraction() -> f64 {
    0.8
}
fn default_burst_size() -> usize {
    10
}
fn default_burst_interval_ns() -> u64 {
    1000
}
fn default_stride() -> u64 {
    64
}

/// Traffic pattern factory parameters. Unknown kinds fail at
/// deserialization, before any simulation work begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkloadSpec {
    /// All devices and addresses equally likely; evenly spaced with jitter.
    Uniform,
    /// Power-law device popularity: rank k drawn with probability
    /// proportional to 1/k^alpha. Addresses follow the same law over
    /// [`ZIPF_PAGES`] pages. `hot_device_fraction` is carried for
    /// configuration compatibility but does not change the sampling.
    Zipfian {
        #[serde(default = "default_alpha")]
        alpha: f64,
        #[serde(default = "default_hot_device_fraction")]
        hot_device_fraction: f64,
    },
    /// One device soaks up `hotspot_fraction` of the traffic; the rest is
    /// uniform over the other devices.
    Hotspot {
        #[serde(default)]
        hotspot_device: DeviceId,
        #[serde(default = "default_hotspot_fraction")]
        hotspot_fraction: f64,
    },
    /// Bursts of `burst_size` requests, 10 ns apart, starting every
    /// `burst_interval_ns`.
    Bursty {
        #[serde(default = "default_burst_size")]
        burst_size: usize,
        #[serde(default = "default_burst_interval_ns")]
        burst_interval_ns: u64,
    },
    /// Each host scans one device sequentially with the given stride.
    Sequential {
        #[serde(default = "default_stride")]
        stride: u64,
    },
}

impl WorkloadSpec {
    /// Produce the request trace for `num_hosts` hosts over `duration_ns`.
    ///
    /// The RNG is explicit: identical seeds yield identical traces, which
    /// the determinism guarantees of the kernel depend on.
    pub fn generate(
        &self,
        num_hosts: usize,
        num_devices: usize,
        duration_ns: u64,
        requests_per_host: usize,
        rng: &mut StdRng,
    ) -> Vec<MemoryRequest> {
        if num_hosts == 0 || num_devices == 0 || requests_per_host == 0 {
            return Vec::new();
        }
        let interval = duration_ns / requests_per_host as u64;
        let mut requests = Vec::with_capacity(num_hosts * requests_per_host);

        match *self {
            WorkloadSpec::Uniform => {
                for host_id in 0..num_hosts {
                    for i in 0..requests_per_host {
                        let timestamp = i as u64 * interval + jitter(interval, rng);
                        let device_id = rng.random_range(0..num_devices);
                        let address = rng.random_range(0..ADDRESS_SPACE);
                        requests.push(MemoryRequest {
                            timestamp,
                            host_id,
                            device_id,
                            address,
                            is_read: true,
                        });
                    }
                }
            }
            WorkloadSpec::Zipfian {
                alpha,
                hot_device_fraction: _,
            } => {
                let device_probs = zipf_probabilities(num_devices, alpha);
                let page_probs = zipf_probabilities(ZIPF_PAGES, alpha);
                let page_size = ADDRESS_SPACE / ZIPF_PAGES as u64;
                for host_id in 0..num_hosts {
                    for i in 0..requests_per_host {
                        let timestamp = i as u64 * interval + jitter(interval, rng);
                        let device_id = zipf_sample(&device_probs, rng);
                        let page = zipf_sample(&page_probs, rng) as u64;
                        let address = page * page_size + rng.random_range(0..page_size);
                        requests.push(MemoryRequest {
                            timestamp,
                            host_id,
                            device_id,
                            address,
                            is_read: true,
                        });
                    }
                }
            }
            WorkloadSpec::Hotspot {
                hotspot_device,
                hotspot_fraction,
            } => {
                let others: Vec<DeviceId> =
                    (0..num_devices).filter(|&d| d != hotspot_device).collect();
                for host_id in 0..num_hosts {
                    for i in 0..requests_per_host {
                        let timestamp = i as u64 * interval + jitter(interval, rng);
                        let device_id = if rng.random::<f64>() < hotspot_fraction || others.is_empty()
                        {
                            hotspot_device
                        } else {
                            others[rng.random_range(0..others.len())]
                        };
                        let address = rng.random_range(0..ADDRESS_SPACE);
                        requests.push(MemoryRequest {
                            timestamp,
                            host_id,
                            device_id,
                            address,
                            is_read: true,
                        });
                    }
                }
            }
            WorkloadSpec::Bursty {
                burst_size,
                burst_interval_ns,
            } => {
                if burst_size == 0 {
                    return Vec::new();
                }
                let num_bursts = requests_per_host / burst_size;
                for host_id in 0..num_hosts {
                    for burst in 0..num_bursts as u64 {
                        let burst_start = burst * burst_interval_ns;
                        if burst_start > duration_ns {
                            break;
                        }
                        for i in 0..burst_size as u64 {
                            let device_id = rng.random_range(0..num_devices);
                            let address = rng.random_range(0..ADDRESS_SPACE);
                            requests.push(MemoryRequest {
                                timestamp: burst_start + i * 10,
                                host_id,
                                device_id,
                                address,
                                is_read: true,
                            });
                        }
                    }
                }
            }
            WorkloadSpec::Sequential { stride } => {
                for host_id in 0..num_hosts {
                    let device_id = host_id % num_devices;
                    for i in 0..requests_per_host as u64 {
                        requests.push(MemoryRequest {
                            timestamp: i * interval,
                            host_id,
                            device_id,
                            address: i * stride,
                            is_read: true,
                        });
                    }
                }
            }
        }
        requests
    }
}

/// Uniform jitter in [0, interval / 10).
fn jitter(interval: u64, rng: &mut StdRng) -> u64 {
    let spread = interval / 10;
    if spread == 0 { 0 } else { rng.random_range(0..spread) }
}

/// Normalized Zipf distribution over ranks 1..=n: p_k proportional to
/// 1/k^alpha.
fn zipf_probabilities(n: usize, alpha: f64) -> Vec<f64> {
    let mut probs: Vec<f64> = (1..=n).map(|k| 1.0 / (k as f64).powf(alpha)).collect();
    let total: f64 = probs.iter().sum();
    for p in &mut probs {
        *p /= total;
    }
    probs
}

/// Cumulative inverse-transform sample from a normalized distribution.
fn zipf_sample(probs: &[f64], rng: &mut StdRng) -> usize {
    let r: f64 = rng.random();
    let mut cumulative = 0.0;
    for (i, p) in probs.iter().enumerate() {
        cumulative += p;
        if r < cumulative {
            return i;
        }
    }
    probs.len() - 1
}
