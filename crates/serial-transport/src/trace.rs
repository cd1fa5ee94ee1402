use crate::{PortInfo, Result, SerialLink};
use std::time::Duration;

/// Wrapper that mirrors every raw write and read to the `wire` tracing
/// target before the bytes are interpreted by any upper layer.
pub struct Traced<L> {
    label: String,
    inner: L,
}

impl<L> Traced<L> {
    pub fn new(label: impl Into<String>, inner: L) -> Self {
        Self {
            label: label.into(),
            inner,
        }
    }

    pub fn into_inner(self) -> L {
        self.inner
    }
}

impl<L: SerialLink> SerialLink for Traced<L> {
    fn open(path: &str) -> Result<Self> {
        Ok(Self::new(path, L::open(path)?))
    }

    fn list() -> Result<Vec<PortInfo>> {
        L::list()
    }

    fn send_raw(&mut self, frame: &[u8]) -> Result<()> {
        tracing::debug!(
            target: "wire",
            link = %self.label,
            "outgoing >> {}",
            String::from_utf8_lossy(frame)
        );
        self.inner.send_raw(frame)
    }

    fn receive_raw(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let frame = self.inner.receive_raw(timeout)?;
        tracing::debug!(
            target: "wire",
            link = %self.label,
            "incoming << {}",
            String::from_utf8_lossy(&frame)
        );
        Ok(frame)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}
