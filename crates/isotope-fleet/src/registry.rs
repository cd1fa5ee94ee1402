use crate::config::{BoardConfig, FleetConfig, PortAddress, PortKind, PumpConfig, ValveConfig};
use crate::error::{ConfigError, FleetError};
use std::collections::HashMap;

/// Device classes the registry knows how to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Pump,
    Valve,
}

/// Configuration-derived map of device name to (board, port) binding.
///
/// Construction validates the whole fleet; a registry is never partially
/// built. Everything here is immutable afterwards and freely shared.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    boards: HashMap<String, BoardConfig>,
    pumps: HashMap<String, PumpConfig>,
    valves: HashMap<String, ValveConfig>,
}

impl DeviceRegistry {
    pub fn build(cfg: &FleetConfig) -> Result<Self, ConfigError> {
        let mut boards = HashMap::new();
        for board in &cfg.boards {
            if boards.insert(board.name.clone(), board.clone()).is_some() {
                return Err(ConfigError::DuplicateBoard(board.name.clone()));
            }
        }

        let mut pumps = HashMap::new();
        let mut claimed: HashMap<PortAddress, String> = HashMap::new();
        for pump in &cfg.pumps {
            check_binding(&boards, &pump.name, &pump.board_name, pump.address())?;
            if let Some(other) = claimed.insert(pump.address(), pump.name.clone()) {
                return Err(ConfigError::DuplicatePort {
                    device: pump.name.clone(),
                    other,
                    address: pump.address(),
                });
            }
            if pumps.insert(pump.name.clone(), pump.clone()).is_some() {
                return Err(ConfigError::DuplicateDevice {
                    class: "pump",
                    name: pump.name.clone(),
                });
            }
        }

        let mut valves = HashMap::new();
        let mut claimed: HashMap<PortAddress, String> = HashMap::new();
        for valve in &cfg.valves {
            check_binding(&boards, &valve.name, &valve.board_name, valve.address())?;
            if let Some(other) = claimed.insert(valve.address(), valve.name.clone()) {
                return Err(ConfigError::DuplicatePort {
                    device: valve.name.clone(),
                    other,
                    address: valve.address(),
                });
            }
            if valves.insert(valve.name.clone(), valve.clone()).is_some() {
                return Err(ConfigError::DuplicateDevice {
                    class: "valve",
                    name: valve.name.clone(),
                });
            }
        }

        Ok(Self {
            boards,
            pumps,
            valves,
        })
    }

    pub fn board(&self, name: &str) -> Option<&BoardConfig> {
        self.boards.get(name)
    }

    pub fn boards(&self) -> impl Iterator<Item = &BoardConfig> {
        self.boards.values()
    }

    pub fn pump_names(&self) -> impl Iterator<Item = &str> {
        self.pumps.keys().map(String::as_str)
    }

    pub fn valve_names(&self) -> impl Iterator<Item = &str> {
        self.valves.keys().map(String::as_str)
    }

    pub fn resolve_pump(&self, name: &str) -> Result<&PumpConfig, FleetError> {
        self.pumps
            .get(name)
            .ok_or_else(|| FleetError::UnknownDevice(name.to_string()))
    }

    pub fn resolve_valve(&self, name: &str) -> Result<&ValveConfig, FleetError> {
        self.valves
            .get(name)
            .ok_or_else(|| FleetError::UnknownDevice(name.to_string()))
    }

    /// Resolve a device of any class to its configured port address.
    pub fn resolve(&self, name: &str) -> Result<(DeviceClass, PortAddress), FleetError> {
        if let Some(pump) = self.pumps.get(name) {
            return Ok((DeviceClass::Pump, pump.address()));
        }
        if let Some(valve) = self.valves.get(name) {
            return Ok((DeviceClass::Valve, valve.address()));
        }
        Err(FleetError::UnknownDevice(name.to_string()))
    }
}

fn check_binding(
    boards: &HashMap<String, BoardConfig>,
    device: &str,
    board_name: &str,
    address: PortAddress,
) -> Result<(), ConfigError> {
    if !boards.contains_key(board_name) {
        return Err(ConfigError::UnknownBoard {
            device: device.to_string(),
            board: board_name.to_string(),
        });
    }
    let max = address.kind.max_ports();
    if address.port_id >= max {
        return Err(ConfigError::PortOutOfRange {
            device: device.to_string(),
            kind: address.kind,
            port_id: address.port_id,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(name: &str) -> BoardConfig {
        BoardConfig {
            name: name.to_string(),
            port: format!("/dev/tty-{name}"),
            comm_timeout: 5.0,
            retries: 0,
            debug_enabled: false,
        }
    }

    fn pump(name: &str, board: &str, port_id: u8) -> PumpConfig {
        PumpConfig {
            name: name.to_string(),
            board_name: board.to_string(),
            port_id,
            rpm: 100,
            current_ma: 400,
            steps_per_degree: 8.0,
            steps_per_ml: 10.0,
            reverse_direction: false,
        }
    }

    fn valve(name: &str, board: &str, port_id: u8) -> ValveConfig {
        ValveConfig {
            name: name.to_string(),
            board_name: board.to_string(),
            port_id,
            normally_open: false,
        }
    }

    #[test]
    fn resolve_returns_the_configured_address() {
        let cfg = FleetConfig {
            boards: vec![board("1")],
            pumps: vec![pump("feed", "1", 0)],
            valves: vec![valve("vent", "1", 2)],
        };
        let reg = DeviceRegistry::build(&cfg).expect("valid fleet");

        let (class, address) = reg.resolve("feed").expect("pump");
        assert_eq!(class, DeviceClass::Pump);
        assert_eq!(
            address,
            PortAddress {
                board: "1".to_string(),
                kind: PortKind::Motor,
                port_id: 0
            }
        );

        let (class, address) = reg.resolve("vent").expect("valve");
        assert_eq!(class, DeviceClass::Valve);
        assert_eq!(address.port_id, 2);
    }

    #[test]
    fn unknown_names_fail_resolution() {
        let cfg = FleetConfig {
            boards: vec![board("1")],
            pumps: vec![pump("feed", "1", 0)],
            valves: vec![],
        };
        let reg = DeviceRegistry::build(&cfg).expect("valid fleet");
        assert!(matches!(
            reg.resolve("drain"),
            Err(FleetError::UnknownDevice(name)) if name == "drain"
        ));
    }

    #[test]
    fn undeclared_board_reference_fails_the_build() {
        let cfg = FleetConfig {
            boards: vec![board("1")],
            pumps: vec![pump("feed", "2", 0)],
            valves: vec![],
        };
        let err = DeviceRegistry::build(&cfg).expect_err("bad board ref");
        assert!(matches!(
            err,
            ConfigError::UnknownBoard { device, board } if device == "feed" && board == "2"
        ));
    }

    #[test]
    fn shared_motor_port_fails_the_build() {
        let cfg = FleetConfig {
            boards: vec![board("1")],
            pumps: vec![pump("feed", "1", 0), pump("waste", "1", 0)],
            valves: vec![],
        };
        let err = DeviceRegistry::build(&cfg).expect_err("port clash");
        assert!(matches!(err, ConfigError::DuplicatePort { .. }));
    }

    #[test]
    fn same_port_id_across_boards_or_classes_is_fine() {
        let cfg = FleetConfig {
            boards: vec![board("1"), board("2")],
            pumps: vec![pump("feed", "1", 0), pump("waste", "2", 0)],
            valves: vec![valve("vent", "1", 0)],
        };
        assert!(DeviceRegistry::build(&cfg).is_ok());
    }

    #[test]
    fn port_id_beyond_the_kind_bound_fails_the_build() {
        let cfg = FleetConfig {
            boards: vec![board("1")],
            pumps: vec![pump("feed", "1", 4)],
            valves: vec![],
        };
        assert!(matches!(
            DeviceRegistry::build(&cfg),
            Err(ConfigError::PortOutOfRange { port_id: 4, max: 4, .. })
        ));

        let cfg = FleetConfig {
            boards: vec![board("1")],
            pumps: vec![],
            valves: vec![valve("vent", "1", 3)],
        };
        assert!(matches!(
            DeviceRegistry::build(&cfg),
            Err(ConfigError::PortOutOfRange { port_id: 3, max: 3, .. })
        ));
    }

    #[test]
    fn duplicate_names_fail_the_build() {
        let cfg = FleetConfig {
            boards: vec![board("1"), board("1")],
            pumps: vec![],
            valves: vec![],
        };
        assert!(matches!(
            DeviceRegistry::build(&cfg),
            Err(ConfigError::DuplicateBoard(_))
        ));

        let cfg = FleetConfig {
            boards: vec![board("1")],
            pumps: vec![pump("feed", "1", 0), pump("feed", "1", 1)],
            valves: vec![],
        };
        assert!(matches!(
            DeviceRegistry::build(&cfg),
            Err(ConfigError::DuplicateDevice { class: "pump", .. })
        ));
    }
}
