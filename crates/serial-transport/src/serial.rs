use crate::{PortInfo, Result, SerialLink, TransportError};
use serialport::{SerialPort, SerialPortType};
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// Baud rate the Isotope Breakout firmware listens at.
pub const DEFAULT_BAUD: u32 = 115_200;

/// USB serial link to one board. Responses are newline-terminated; request
/// frames are written as-is.
pub struct UsbSerialLink {
    path: String,
    port: Option<Box<dyn SerialPort>>,
    // Bytes read past the last terminator, kept for the next receive
    carry: Vec<u8>,
}

impl UsbSerialLink {
    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }

    /// Pop one terminated frame off the carry buffer, if present.
    fn take_frame(&mut self) -> Option<Vec<u8>> {
        let pos = self.carry.iter().position(|&b| b == b'\n')?;
        let mut frame: Vec<u8> = self.carry.drain(..=pos).collect();
        frame.pop();
        if frame.last() == Some(&b'\r') {
            frame.pop();
        }
        Some(frame)
    }
}

impl SerialLink for UsbSerialLink {
    fn open(path: &str) -> Result<Self> {
        let port = serialport::new(path, DEFAULT_BAUD)
            .timeout(Duration::from_millis(200))
            .open()
            .map_err(|e| TransportError::PortUnavailable(e.to_string()))?;
        Ok(Self {
            path: path.to_string(),
            port: Some(port),
            carry: Vec::new(),
        })
    }

    fn list() -> Result<Vec<PortInfo>> {
        let mut out = Vec::new();
        for p in serialport::available_ports().map_err(|e| TransportError::Io(e.to_string()))? {
            let driver = match p.port_type {
                SerialPortType::UsbPort(_) => "usb-serial",
                _ => "serial",
            };
            out.push(PortInfo {
                name: p.port_name,
                driver: driver.to_string(),
            });
        }
        Ok(out)
    }

    fn send_raw(&mut self, frame: &[u8]) -> Result<()> {
        let port = self.port_mut()?;
        port.write_all(frame)
            .map_err(|e| TransportError::Write(e.to_string()))?;
        port.flush()
            .map_err(|e| TransportError::Write(e.to_string()))?;
        Ok(())
    }

    fn receive_raw(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        if let Some(frame) = self.take_frame() {
            return Ok(frame);
        }
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 256];
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .filter(|d| !d.is_zero())
                .ok_or(TransportError::Timeout)?;
            let port = self.port_mut()?;
            port.set_timeout(remaining)
                .map_err(|e| TransportError::Io(e.to_string()))?;
            match port.read(&mut buf) {
                Ok(0) => return Err(TransportError::Io(format!("{} hung up", self.path))),
                Ok(n) => {
                    self.carry.extend_from_slice(&buf[..n]);
                    if let Some(frame) = self.take_frame() {
                        return Ok(frame);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    return Err(TransportError::Timeout)
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::Io(e.to_string())),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.port = None;
        self.carry.clear();
        Ok(())
    }
}
