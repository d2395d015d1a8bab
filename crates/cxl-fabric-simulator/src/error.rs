use cxl_fabric_abstract::{DeviceId, EventKind, SwitchId};
use thiserror::Error;

/// Fatal simulation errors. Congestion drops are not errors; they are
/// counted outcomes reported through statistics.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    /// Scheduling behind the clock is a programming bug in the caller.
    #[error("cannot schedule event at {at} ns: simulation time is already {now} ns")]
    PastEvent { at: u64, now: u64 },

    /// The topology has no link attached where routing expected one.
    #[error("no link attached to switch {switch} port {port} while routing to device {device}")]
    MissingLink {
        switch: SwitchId,
        port: usize,
        device: DeviceId,
    },

    #[error("invalid port {port} for switch {switch} with {num_ports} ports")]
    InvalidPort {
        switch: SwitchId,
        port: usize,
        num_ports: usize,
    },

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// A dispatched event was missing a field its kind requires. Only a
    /// non-conformant driver can produce this.
    #[error("malformed {kind:?} event: missing {field}")]
    MalformedEvent {
        kind: EventKind,
        field: &'static str,
    },
}
