use std::collections::{HashMap, HashSet};

use cxl_fabric_abstract::{DeviceId, FabricConfig, HostId, SwitchId};
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::host::Host;
use crate::switch::Switch;

/// Bidirectional inter-switch link between two (switch, port) endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub sw_a: SwitchId,
    pub port_a: usize,
    pub sw_b: SwitchId,
    pub port_b: usize,
}

/// Where a packet goes after leaving a switch on a given output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hop {
    /// The output port is the destination device's attachment point.
    Device,
    Switch {
        switch: SwitchId,
        arrival_port: usize,
    },
}

/// Host-leaf uplink selection for the two-tier topology.
///
/// `SpineZero` sends everything through spine 0, which deliberately
/// concentrates load and is what makes the sample congestion results
/// reproducible. `RoundRobin` spreads devices across spines by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UplinkPolicy {
    #[default]
    SpineZero,
    RoundRobin,
}

fn default_queue_depth() -> usize {
    32
}

/// Topology factory parameters. Unknown kinds fail at deserialization,
/// before any simulation work begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologySpec {
    /// One switch; hosts on the low ports, devices on the high ports.
    Single {
        num_hosts: usize,
        num_devices: usize,
        #[serde(default = "default_queue_depth")]
        queue_depth: usize,
    },
    /// Spine-leaf fabric. The first `floor(num_leaves / 2) + 1` leaves carry
    /// hosts, the remainder carry devices; every spine connects to every
    /// leaf.
    TwoTier {
        num_spines: usize,
        num_leaves: usize,
        hosts_per_leaf: usize,
        devices_per_leaf: usize,
        #[serde(default = "default_queue_depth")]
        queue_depth: usize,
        #[serde(default)]
        uplink_policy: UplinkPolicy,
    },
}

impl TopologySpec {
    pub fn build(&self) -> Result<Topology, SimError> {
        self.build_with(&FabricConfig::default())
    }

    pub fn build_with(&self, config: &FabricConfig) -> Result<Topology, SimError> {
        let topology = match *self {
            TopologySpec::Single {
                num_hosts,
                num_devices,
                queue_depth,
            } => build_single(num_hosts, num_devices, queue_depth, config)?,
            TopologySpec::TwoTier {
                num_spines,
                num_leaves,
                hosts_per_leaf,
                devices_per_leaf,
                queue_depth,
                uplink_policy,
            } => build_two_tier(
                num_spines,
                num_leaves,
                hosts_per_leaf,
                devices_per_leaf,
                queue_depth,
                uplink_policy,
                config,
            )?,
        };
        topology.validate()?;
        Ok(topology)
    }
}

/// A built fabric: switches with installed routing tables, attached hosts
/// and devices, and the inter-switch link list the routes were derived
/// from.
///
/// Switches are stored by index and referenced everywhere by `SwitchId`;
/// events never hold pointers into the topology.
#[derive(Debug)]
pub struct Topology {
    pub switches: Vec<Switch>,
    pub hosts: Vec<Host>,
    pub devices: Vec<DeviceId>,
    pub host_to_switch: HashMap<HostId, SwitchId>,
    pub device_to_switch: HashMap<DeviceId, SwitchId>,
    pub switch_links: Vec<Link>,
    host_ports: HashMap<HostId, usize>,
    device_ports: HashMap<DeviceId, usize>,
    pub config: FabricConfig,
}

impl Topology {
    /// Arrival port of a host on its home switch.
    pub fn host_arrival_port(&self, host: HostId) -> Option<usize> {
        self.host_ports.get(&host).copied()
    }

    /// Device-side port of a device on its leaf switch.
    pub fn device_port(&self, device: DeviceId) -> Option<usize> {
        self.device_ports.get(&device).copied()
    }

    /// Resolve where a packet leaving `switch` on `output_port` lands.
    ///
    /// Delivery to the device happens only on the device's own leaf through
    /// its attachment port; otherwise the link list is searched in both
    /// directions. No match is a topology/routing inconsistency and fatal.
    pub fn next_hop(
        &self,
        switch: SwitchId,
        output_port: usize,
        device: DeviceId,
    ) -> Result<Hop, SimError> {
        if self.device_to_switch.get(&device) == Some(&switch)
            && self.device_ports.get(&device) == Some(&output_port)
        {
            return Ok(Hop::Device);
        }
        for link in &self.switch_links {
            if link.sw_a == switch && link.port_a == output_port {
                return Ok(Hop::Switch {
                    switch: link.sw_b,
                    arrival_port: link.port_b,
                });
            }
            if link.sw_b == switch && link.port_b == output_port {
                return Ok(Hop::Switch {
                    switch: link.sw_a,
                    arrival_port: link.port_a,
                });
            }
        }
        Err(SimError::MissingLink {
            switch,
            port: output_port,
            device,
        })
    }

    /// Structural invariants: link endpoints stay within their switch's
    /// port range, no two links (and no device attachment) share an
    /// endpoint, and every host/device attachment port exists.
    fn validate(&self) -> Result<(), SimError> {
        let mut endpoints: HashSet<(SwitchId, usize)> = HashSet::new();
        for link in &self.switch_links {
            for (sw, port) in [(link.sw_a, link.port_a), (link.sw_b, link.port_b)] {
                let num_ports = self
                    .switches
                    .get(sw)
                    .map(Switch::num_ports)
                    .ok_or_else(|| {
                        SimError::InvalidTopology(format!("link references unknown switch {sw}"))
                    })?;
                if port >= num_ports {
                    return Err(SimError::InvalidTopology(format!(
                        "link endpoint ({sw}, {port}) outside switch port range {num_ports}"
                    )));
                }
                if !endpoints.insert((sw, port)) {
                    return Err(SimError::InvalidTopology(format!(
                        "two links share endpoint ({sw}, {port})"
                    )));
                }
            }
        }
        for (&device, &port) in &self.device_ports {
            let leaf = self.device_to_switch[&device];
            if endpoints.contains(&(leaf, port)) {
                return Err(SimError::InvalidTopology(format!(
                    "device {device} attachment ({leaf}, {port}) collides with a link endpoint"
                )));
            }
        }
        for (&host, &port) in &self.host_ports {
            let switch = self.host_to_switch[&host];
            if port >= self.switches[switch].num_ports() {
                return Err(SimError::InvalidTopology(format!(
                    "host {host} attached to missing port {port} on switch {switch}"
                )));
            }
        }
        Ok(())
    }
}

fn build_single(
    num_hosts: usize,
    num_devices: usize,
    queue_depth: usize,
    config: &FabricConfig,
) -> Result<Topology, SimError> {
    let mut switch = Switch::new(0, num_hosts + num_devices, queue_depth, config);

    let mut hosts = Vec::with_capacity(num_hosts);
    let mut host_to_switch = HashMap::new();
    let mut host_ports = HashMap::new();
    for host_id in 0..num_hosts {
        hosts.push(Host::new(host_id, 0));
        host_to_switch.insert(host_id, 0);
        host_ports.insert(host_id, host_id);
    }

    let mut device_to_switch = HashMap::new();
    let mut device_ports = HashMap::new();
    let devices: Vec<DeviceId> = (0..num_devices).collect();
    for &device in &devices {
        let port = num_hosts + device;
        switch.set_route(device, port)?;
        device_to_switch.insert(device, 0);
        device_ports.insert(device, port);
    }

    Ok(Topology {
        switches: vec![switch],
        hosts,
        devices,
        host_to_switch,
        device_to_switch,
        switch_links: Vec::new(),
        host_ports,
        device_ports,
        config: config.clone(),
    })
}

fn build_two_tier(
    num_spines: usize,
    num_leaves: usize,
    hosts_per_leaf: usize,
    devices_per_leaf: usize,
    queue_depth: usize,
    uplink_policy: UplinkPolicy,
    config: &FabricConfig,
) -> Result<Topology, SimError> {
    if num_spines == 0 {
        return Err(SimError::InvalidTopology(
            "two-tier topology needs at least one spine".into(),
        ));
    }
    let num_host_leaves = num_leaves / 2 + 1;
    if num_host_leaves >= num_leaves {
        return Err(SimError::InvalidTopology(format!(
            "{num_leaves} leaves leave no device leaves after reserving {num_host_leaves} host leaves"
        )));
    }

    let mut switches = Vec::with_capacity(num_spines + num_leaves);
    for spine in 0..num_spines {
        switches.push(Switch::new(spine, num_leaves, queue_depth, config));
    }
    let leaf_ports = num_spines + hosts_per_leaf.max(devices_per_leaf);
    for leaf_idx in 0..num_leaves {
        switches.push(Switch::new(num_spines + leaf_idx, leaf_ports, queue_depth, config));
    }

    let host_leaves: Vec<SwitchId> = (0..num_host_leaves).map(|i| num_spines + i).collect();
    let device_leaves: Vec<SwitchId> = (num_host_leaves..num_leaves).map(|i| num_spines + i).collect();

    // Full bipartite mesh: spine port = leaf index, leaf port = spine index.
    let mut switch_links = Vec::with_capacity(num_spines * num_leaves);
    for spine in 0..num_spines {
        for leaf_idx in 0..num_leaves {
            switch_links.push(Link {
                sw_a: spine,
                port_a: leaf_idx,
                sw_b: num_spines + leaf_idx,
                port_b: spine,
            });
        }
    }

    let mut hosts = Vec::new();
    let mut host_to_switch = HashMap::new();
    let mut host_ports = HashMap::new();
    let mut host_id: HostId = 0;
    for &leaf in &host_leaves {
        for slot in 0..hosts_per_leaf {
            hosts.push(Host::new(host_id, leaf));
            host_to_switch.insert(host_id, leaf);
            host_ports.insert(host_id, num_spines + slot);
            host_id += 1;
        }
    }

    let mut devices = Vec::new();
    let mut device_to_switch = HashMap::new();
    let mut device_ports = HashMap::new();
    let mut device_id: DeviceId = 0;
    for &leaf in &device_leaves {
        for slot in 0..devices_per_leaf {
            devices.push(device_id);
            device_to_switch.insert(device_id, leaf);
            device_ports.insert(device_id, num_spines + slot);
            device_id += 1;
        }
    }

    for &device in &devices {
        let device_leaf = device_to_switch[&device];
        switches[device_leaf].set_route(device, device_ports[&device])?;

        // Each spine reaches the device's leaf through exactly one port.
        for spine in 0..num_spines {
            let uplink = switch_links
                .iter()
                .find(|link| link.sw_a == spine && link.sw_b == device_leaf)
                .ok_or(SimError::MissingLink {
                    switch: spine,
                    port: 0,
                    device,
                })?;
            switches[spine].set_route(device, uplink.port_a)?;
        }

        for &leaf in &host_leaves {
            let uplink_port = match uplink_policy {
                UplinkPolicy::SpineZero => 0,
                UplinkPolicy::RoundRobin => device % num_spines,
            };
            switches[leaf].set_route(device, uplink_port)?;
        }
    }

    Ok(Topology {
        switches,
        hosts,
        devices,
        host_to_switch,
        device_to_switch,
        switch_links,
        host_ports,
        device_ports,
        config: config.clone(),
    })
}
