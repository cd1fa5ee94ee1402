use core::fmt;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// The typed port families of one Isotope Breakout board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub enum PortKind {
    Motor,
    Valve,
    Analogue,
    Pwm,
    Temperature,
}

impl PortKind {
    /// Number of ports of this kind on a board; port ids run 0..max.
    pub fn max_ports(self) -> u8 {
        match self {
            PortKind::Motor => 4,
            PortKind::Valve => 3,
            PortKind::Analogue => 3,
            PortKind::Pwm => 4,
            PortKind::Temperature => 3,
        }
    }
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortKind::Motor => "motor",
            PortKind::Valve => "valve",
            PortKind::Analogue => "analogue",
            PortKind::Pwm => "pwm",
            PortKind::Temperature => "temperature",
        };
        f.write_str(s)
    }
}

/// Fully qualified address of one port in a fleet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct PortAddress {
    pub board: String,
    pub kind: PortKind,
    pub port_id: u8,
}

impl fmt::Display for PortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.board, self.kind, self.port_id)
    }
}

// Board and device names may be written as bare integers in YAML.
fn name_or_number<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }
    Ok(match Raw::deserialize(de)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

fn default_comm_timeout() -> f64 {
    5.0
}

/// One configured board. Immutable after load; one board config maps to
/// exactly one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct BoardConfig {
    #[serde(deserialize_with = "name_or_number")]
    pub name: String,
    /// Serial port address, e.g. "/dev/ttyACM0" or "COM3".
    pub port: String,
    /// Seconds to wait for each response before a timeout.
    #[serde(default = "default_comm_timeout")]
    pub comm_timeout: f64,
    /// Automatic re-sends after a timeout before the error surfaces.
    #[serde(default)]
    pub retries: u32,
    /// Mirror raw wire traffic to the trace log.
    #[serde(default)]
    pub debug_enabled: bool,
}

impl BoardConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.comm_timeout.max(0.0))
    }
}

/// One configured diaphragm pump on a motor port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct PumpConfig {
    #[serde(deserialize_with = "name_or_number")]
    pub name: String,
    #[serde(deserialize_with = "name_or_number")]
    pub board_name: String,
    pub port_id: u8,
    #[serde(default = "PumpConfig::default_rpm")]
    pub rpm: u32,
    /// Motor current limit in milliamps. No default on purpose: an
    /// over-current setting can damage the pump and the board.
    #[serde(alias = "current")]
    pub current_ma: u32,
    pub steps_per_degree: f64,
    pub steps_per_ml: f64,
    #[serde(default)]
    pub reverse_direction: bool,
}

impl PumpConfig {
    fn default_rpm() -> u32 {
        100
    }

    pub fn address(&self) -> PortAddress {
        PortAddress {
            board: self.board_name.clone(),
            kind: PortKind::Motor,
            port_id: self.port_id,
        }
    }
}

/// One configured solenoid valve on a power output port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct ValveConfig {
    #[serde(deserialize_with = "name_or_number")]
    pub name: String,
    #[serde(deserialize_with = "name_or_number")]
    pub board_name: String,
    pub port_id: u8,
    /// Wiring polarity: a normally-open valve is physically open with the
    /// port released.
    #[serde(default)]
    pub normally_open: bool,
}

impl ValveConfig {
    pub fn address(&self) -> PortAddress {
        PortAddress {
            board: self.board_name.clone(),
            kind: PortKind::Valve,
            port_id: self.port_id,
        }
    }
}

/// The merged, typed configuration of a whole fleet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct FleetConfig {
    pub boards: Vec<BoardConfig>,
    #[serde(default)]
    pub pumps: Vec<PumpConfig>,
    #[serde(default)]
    pub valves: Vec<ValveConfig>,
}
