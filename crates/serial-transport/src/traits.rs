use crate::{PortInfo, Result};
use std::time::Duration;

/// A minimal blocking serial link carrying one frame per exchange.
///
/// A frame is the raw byte payload of one request or response; the wire
/// terminator is a backend concern and never appears in the returned bytes.
pub trait SerialLink {
    /// Open a link to the board on the given port (e.g., "/dev/ttyACM0", "COM3").
    fn open(path: &str) -> Result<Self>
    where
        Self: Sized;

    /// Attempt to list candidate ports for this backend.
    fn list() -> Result<Vec<PortInfo>>
    where
        Self: Sized;

    /// Write one complete frame.
    fn send_raw(&mut self, frame: &[u8]) -> Result<()>;

    /// Receive one complete frame, waiting at most `timeout`.
    ///
    /// The timeout bounds this single receive call, not a whole exchange.
    fn receive_raw(&mut self, timeout: Duration) -> Result<Vec<u8>>;

    /// Close the link. Safe to call more than once.
    fn close(&mut self) -> Result<()>;
}
