//! Configuration file management for airtrack.
//!
//! Reads/writes `~/.airtrack/config.yaml` with the relay port and publish
//! topic, MQTT broker address, and the tracked-device table.

use std::path::{Path, PathBuf};

use crate::registry::DeviceRegistry;
use crate::types::AirtrackError;

/// Default UDP listening port.
pub const DEFAULT_PORT: u16 = 1911;

/// Default publish topic.
pub const DEFAULT_TOPIC: &str = "tracking/data";

/// Full configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    pub relay: RelayConfig,
    pub broker: BrokerConfig,
    /// Configured devices as (logical name, imei) pairs, in file order.
    pub devices: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub port: u16,
    pub topic: String,
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            relay: RelayConfig {
                port: DEFAULT_PORT,
                topic: DEFAULT_TOPIC.into(),
            },
            broker: BrokerConfig {
                host: "localhost".into(),
                port: 1883,
            },
            devices: Vec::new(),
        }
    }
}

impl Config {
    /// Build the immutable device registry from the configured table.
    pub fn registry(&self) -> DeviceRegistry {
        DeviceRegistry::from_devices(
            self.devices
                .iter()
                .map(|(name, imei)| (name.as_str(), imei.as_str())),
        )
    }
}

/// Get the config directory path (`~/.airtrack/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".airtrack")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.airtrack/config.yaml`.
///
/// Returns default config if the file doesn't exist.
pub fn load_config() -> Config {
    load_config_from(&config_file())
}

/// Load config from an explicit path, defaults on a missing or
/// unreadable file.
pub fn load_config_from(path: &Path) -> Config {
    if !path.exists() {
        return Config::default();
    }

    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(_) => return Config::default(),
    };

    parse_config(&text).unwrap_or_default()
}

/// Save config to `~/.airtrack/config.yaml`.
pub fn save_config(config: &Config) -> Result<PathBuf, AirtrackError> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir).map_err(|e| AirtrackError::Config(e.to_string()))?;

    let path = config_file();
    let text = serialize_config(config);
    std::fs::write(&path, text).map_err(|e| AirtrackError::Config(e.to_string()))?;

    Ok(path)
}

/// Parse simple YAML-like config text.
fn parse_config(text: &str) -> Option<Config> {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        if let Some((key, val)) = stripped.split_once(':') {
            let key = key.trim();
            let val = val.trim();

            if !is_indented {
                if val.is_empty() {
                    current_section = Some(key.to_string());
                } else {
                    current_section = None;
                }
            } else if let Some(ref section) = current_section {
                match section.as_str() {
                    "relay" => match key {
                        "port" => {
                            if let Some(v) = parse_port_value(val) {
                                config.relay.port = v;
                            }
                        }
                        "topic" => {
                            if let Some(v) = parse_string_value(val) {
                                config.relay.topic = v;
                            }
                        }
                        _ => {}
                    },
                    "broker" => match key {
                        "host" => {
                            if let Some(v) = parse_string_value(val) {
                                config.broker.host = v;
                            }
                        }
                        "port" => {
                            if let Some(v) = parse_port_value(val) {
                                config.broker.port = v;
                            }
                        }
                        _ => {}
                    },
                    // Any key under devices is a logical name, its value
                    // the hardware imei
                    "devices" => {
                        if let Some(imei) = parse_string_value(val) {
                            config.devices.push((key.to_string(), imei));
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    Some(config)
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    // Strip quotes
    if (val.starts_with('"') && val.ends_with('"'))
        || (val.starts_with('\'') && val.ends_with('\''))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

fn parse_port_value(val: &str) -> Option<u16> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    val.parse().ok()
}

/// Serialize config to YAML-like text.
fn serialize_config(config: &Config) -> String {
    let mut lines = vec!["# airtrack configuration".to_string(), String::new()];

    lines.push("relay:".into());
    lines.push(format!("  port: {}", config.relay.port));
    lines.push(format!("  topic: \"{}\"", config.relay.topic));
    lines.push(String::new());

    lines.push("broker:".into());
    lines.push(format!("  host: \"{}\"", config.broker.host));
    lines.push(format!("  port: {}", config.broker.port));
    lines.push(String::new());

    lines.push("devices:".into());
    for (name, imei) in &config.devices {
        lines.push(format!("  {name}: \"{imei}\""));
    }

    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.relay.port, 1911);
        assert_eq!(config.relay.topic, "tracking/data");
        assert_eq!(config.broker.host, "localhost");
        assert_eq!(config.broker.port, 1883);
        assert!(config.devices.is_empty());
        assert!(config.registry().is_empty());
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
relay:
  port: 2911
  topic: "race/tracking"

broker:
  host: "broker.example.com"
  port: 8883

devices:
  bike7: "135790246811220"
  bike8: "135790246811221"
"#;
        let config = parse_config(text).unwrap();
        assert_eq!(config.relay.port, 2911);
        assert_eq!(config.relay.topic, "race/tracking");
        assert_eq!(config.broker.host, "broker.example.com");
        assert_eq!(config.broker.port, 8883);
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0], ("bike7".into(), "135790246811220".into()));

        let registry = config.registry();
        assert_eq!(registry.lookup("135790246811221"), Some("bike8"));
    }

    #[test]
    fn test_parse_config_partial() {
        let text = r#"
relay:
  topic: "race/tracking"
"#;
        let config = parse_config(text).unwrap();
        // Unset keys keep their defaults
        assert_eq!(config.relay.port, 1911);
        assert_eq!(config.relay.topic, "race/tracking");
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_parse_config_null_values() {
        let text = r#"
relay:
  port: ~
  topic: null

devices:
  bike7: null
"#;
        let config = parse_config(text).unwrap();
        assert_eq!(config.relay.port, 1911);
        assert_eq!(config.relay.topic, "tracking/data");
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_roundtrip() {
        let config = Config {
            relay: RelayConfig {
                port: 2911,
                topic: "race/tracking".into(),
            },
            broker: BrokerConfig {
                host: "broker.example.com".into(),
                port: 8883,
            },
            devices: vec![("bike7".into(), "135790246811220".into())],
        };
        let text = serialize_config(&config);
        let parsed = parse_config(&text).unwrap();
        assert_eq!(parsed.relay.port, 2911);
        assert_eq!(parsed.relay.topic, "race/tracking");
        assert_eq!(parsed.broker.host, "broker.example.com");
        assert_eq!(parsed.devices, config.devices);
    }

    #[test]
    fn test_load_config_missing_file() {
        let config = load_config_from(Path::new("/nonexistent/airtrack.yaml"));
        assert_eq!(config.relay.port, 1911);
    }
}
