use thiserror::Error;

pub type Result<T, E = TransportError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("serial port unavailable: {0}")]
    PortUnavailable(String),
    #[error("write failed: {0}")]
    Write(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("timeout")]
    Timeout,
    #[error("link closed")]
    Closed,
}
