use crate::config::{BoardConfig, FleetConfig, PumpConfig, ValveConfig};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;

// On-disk schema: three sections, each a defaults map plus a device list.
#[derive(Debug, Default, Deserialize)]
struct RawSection {
    #[serde(default)]
    defaults: Mapping,
    #[serde(default)]
    devices: Vec<Mapping>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    isotope_board: RawSection,
    #[serde(default)]
    pump: RawSection,
    #[serde(default)]
    valve: RawSection,
}

/// Merge the section defaults under each device entry (entry keys win) and
/// deserialize the result. This is the whole defaults story; nothing at
/// runtime re-reads defaults.
fn merge_section<T: DeserializeOwned>(section: RawSection, what: &str) -> anyhow::Result<Vec<T>> {
    section
        .devices
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let mut merged = section.defaults.clone();
            for (key, value) in entry {
                merged.insert(key, value);
            }
            let label = entry_label(&merged, i);
            serde_yaml::from_value(Value::Mapping(merged))
                .with_context(|| format!("decoding {what} entry {label}"))
        })
        .collect()
}

fn entry_label(entry: &Mapping, index: usize) -> String {
    for (key, value) in entry {
        if key.as_str() == Some("name") {
            return match value {
                Value::String(s) => s.clone(),
                other => serde_yaml::to_string(other)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|_| format!("#{index}")),
            };
        }
    }
    format!("#{index}")
}

/// Parse a fleet configuration from YAML text.
pub fn parse_config_str(raw: &str) -> anyhow::Result<FleetConfig> {
    let raw: RawConfig = serde_yaml::from_str(raw).context("parsing fleet configuration")?;
    Ok(FleetConfig {
        boards: merge_section::<BoardConfig>(raw.isotope_board, "isotope_board")?,
        pumps: merge_section::<PumpConfig>(raw.pump, "pump")?,
        valves: merge_section::<ValveConfig>(raw.valve, "valve")?,
    })
}

/// Load and merge a fleet configuration file.
pub fn load_config_file(path: impl AsRef<Path>) -> anyhow::Result<FleetConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading configuration: {}", path.display()))?;
    parse_config_str(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
isotope_board:
  defaults:
    debug_enabled: false
    comm_timeout: 5
  devices:
    - name: 1
      port: COM3
    - name: 2
      port: COM4
      comm_timeout: 2.5
      debug_enabled: true

pump:
  defaults:
    rpm: 100
    current: 400
    steps_per_degree: 8
    steps_per_ml: 10
    reverse_direction: false
  devices:
    - name: pump1
      board_name: 1
      port_id: 0
    - name: pump2
      board_name: 2
      port_id: 1
      steps_per_ml: 48
      reverse_direction: true

valve:
  defaults:
    normally_open: false
  devices:
    - name: valve1
      board_name: 1
      port_id: 0
      normally_open: true
"#;

    #[test]
    fn defaults_merge_with_entry_overrides_winning() {
        let cfg = parse_config_str(SAMPLE).expect("parse sample");

        assert_eq!(cfg.boards.len(), 2);
        let b1 = &cfg.boards[0];
        assert_eq!(b1.name, "1");
        assert_eq!(b1.port, "COM3");
        assert_eq!(b1.comm_timeout, 5.0);
        assert!(!b1.debug_enabled);
        let b2 = &cfg.boards[1];
        assert_eq!(b2.comm_timeout, 2.5);
        assert!(b2.debug_enabled);

        let p1 = &cfg.pumps[0];
        assert_eq!(p1.rpm, 100);
        assert_eq!(p1.current_ma, 400);
        assert_eq!(p1.steps_per_ml, 10.0);
        assert!(!p1.reverse_direction);
        let p2 = &cfg.pumps[1];
        assert_eq!(p2.steps_per_ml, 48.0);
        assert!(p2.reverse_direction);
        assert_eq!(p2.board_name, "2");

        assert!(cfg.valves[0].normally_open);
    }

    #[test]
    fn missing_pump_and_valve_sections_are_empty() {
        let cfg = parse_config_str(
            "isotope_board:\n  devices:\n    - name: solo\n      port: /dev/ttyACM0\n",
        )
        .expect("boards only");
        assert_eq!(cfg.boards.len(), 1);
        assert!(cfg.pumps.is_empty());
        assert!(cfg.valves.is_empty());
    }

    #[test]
    fn missing_required_keys_name_the_entry() {
        // pump1 has no current and the defaults do not supply one
        let err = parse_config_str(
            r#"
isotope_board:
  devices:
    - name: 1
      port: COM3
pump:
  devices:
    - name: pump1
      board_name: 1
      port_id: 0
      steps_per_degree: 8
      steps_per_ml: 10
"#,
        )
        .expect_err("incomplete pump");
        assert!(format!("{err:#}").contains("pump1"));
    }
}
