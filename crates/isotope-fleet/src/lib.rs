//! isotope-fleet: host-side driver for fleets of Isotope Breakout boards
//!
//! One Isotope Breakout board exposes typed, numbered I/O ports (motor,
//! valve power, analogue, PWM, temperature) behind a JSON-over-serial
//! command protocol. This crate maps configuration-declared devices (pumps,
//! valves) onto (board, port) addresses, serializes command traffic per
//! board, and translates domain units into board commands.

mod config;
pub use config::{
    BoardConfig, FleetConfig, PortAddress, PortKind, PumpConfig, ValveConfig,
};

mod error;
pub use error::{CodecError, ConfigError, DeviceError, FleetError, SessionError};

mod loader;
pub use loader::{load_config_file, parse_config_str};

mod encode;
pub use encode::{decode_command, encode, Command, Operation};

mod decode;
pub use decode::{decode_response, FaultCode, Response};

mod gate;
pub use gate::{CommandGate, GatePass};

mod session;
pub use session::{BoardIdentity, BoardSession, SessionState};

mod registry;
pub use registry::{DeviceClass, DeviceRegistry};

mod pump;
pub use pump::Pump;

mod valve;
pub use valve::Valve;

mod fleet;
pub use fleet::Fleet;

mod metrics;
pub use metrics::{MetricsHub, SessionMetrics};
