//! serial-transport: serial link abstractions for Isotope Breakout boards
//!
//! This crate provides the trait and types for exchanging raw frames with one
//! board over a serial channel, with feature-gated backends. The default
//! build enables a `mock` backend so that binaries and tests can run on any
//! host without hardware attached.

mod types;
pub use types::PortInfo;

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::SerialLink;

mod trace;
pub use trace::Traced;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockHandle, MockLink, MockReply};

#[cfg(feature = "serial")]
mod serial;

#[cfg(feature = "serial")]
pub use serial::{UsbSerialLink, DEFAULT_BAUD};
