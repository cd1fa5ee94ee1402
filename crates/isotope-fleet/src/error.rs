use crate::config::{PortAddress, PortKind};
use crate::decode::FaultCode;
use serial_transport::TransportError;
use thiserror::Error;

/// Rejections raised while building a [`crate::DeviceRegistry`]. These fire
/// at construction time, never during a device operation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{device}: board {board} is not declared in the fleet configuration")]
    UnknownBoard { device: String, board: String },
    #[error("{device}: port id {port_id} out of range for {kind} ports (0..{max})")]
    PortOutOfRange {
        device: String,
        kind: PortKind,
        port_id: u8,
        max: u8,
    },
    #[error("{device}: {address} is already assigned to {other}")]
    DuplicatePort {
        device: String,
        other: String,
        address: PortAddress,
    },
    #[error("duplicate {class} name: {name}")]
    DuplicateDevice { class: &'static str, name: String },
    #[error("duplicate board name: {0}")]
    DuplicateBoard(String),
}

/// A frame that does not match any known request or response shape.
#[derive(Debug, Error)]
#[error("malformed frame: {0}")]
pub struct CodecError(pub String);

/// Errors surfaced by a [`crate::BoardSession`] exchange.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("port unavailable: {0}")]
    PortUnavailable(#[source] TransportError),
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("no response after {attempts} attempt(s)")]
    Timeout { attempts: u32 },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("board fault: {0}")]
    BoardFault(FaultCode),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("session closed")]
    Closed,
}

/// A session error tagged with the device it struck, for diagnostics.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device {device}: {source}")]
    Session {
        device: String,
        #[source]
        source: SessionError,
    },
    #[error("device {device}: invalid request: {reason}")]
    InvalidRequest { device: String, reason: String },
}

/// Errors surfaced by the fleet coordinator.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unknown device: {0}")]
    UnknownDevice(String),
    #[error("board {board}: {source}")]
    Board {
        board: String,
        #[source]
        source: SessionError,
    },
    #[error("metrics init error: {0}")]
    Metrics(String),
}
