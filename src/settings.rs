use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::{error, info};
use twig_motor::{Direction, MotorConfig, Persistence};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Top-level runner configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub motors: Vec<MotorEntry>,
}

/// The simulated bus: which addresses have a shield listening.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusConfig {
    #[serde(default)]
    pub shields: Vec<u8>,
}

/// One motor handle and the script it runs.
#[derive(Debug, Clone, Deserialize)]
pub struct MotorEntry {
    pub name: String,
    #[serde(default)]
    pub motor: MotorConfig,
    pub frequency_prescaler: Option<u8>,
    #[serde(default)]
    pub moves: Vec<MoveCommand>,
    pub change_address: Option<AddressChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveCommand {
    pub steps: i32,
    #[serde(default)]
    pub direction: Direction,
    /// Speed to switch to before this move
    pub rpm: Option<u32>,
    /// Shield to send this move to; defaults to the handle's current address
    pub address: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressChange {
    pub new_address: u8,
    pub persistence: Persistence,
}

type Builder = config::ConfigBuilder<config::builder::DefaultState>;

fn builder() -> Builder {
    Config::builder()
}

fn finish(builder: Builder) -> Result<AppConfig, ConfigError> {
    builder
        .add_source(Environment::with_prefix("TWIG").separator("__"))
        .build()?
        .try_deserialize()
}

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    info!("Attempting to load configuration from {}", path);

    let settings = finish(builder().add_source(File::new(path, FileFormat::Toml).required(true)));

    match settings {
        Ok(config) => {
            info!(
                motors = config.motors.len(),
                shields = ?config.bus.shields,
                "Successfully loaded configuration"
            );
            Ok(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
pub fn load_config_str(toml: &str) -> Result<AppConfig, ConfigError> {
    finish(builder().add_source(File::from_str(toml, FileFormat::Toml)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use twig_motor::{AddressCommit, SchedulingPolicy};

    const SAMPLE: &str = r#"
[bus]
shields = [0x28, 0x29]

[[motors]]
name = "pan"
frequency_prescaler = 2

[motors.motor]
steps_per_revolution = 48
address = 0x28
rpm = 30
scheduling = "cooperative"
address_commit = "always"

[[motors.moves]]
steps = 96
direction = "forward"

[[motors.moves]]
steps = 24
direction = "backward"
rpm = 60

[motors.change_address]
new_address = 0x30
persistence = "no_save"
"#;

    #[test]
    fn test_parse_sample() {
        let config = load_config_str(SAMPLE).unwrap();
        assert_eq!(config.bus.shields, vec![0x28, 0x29]);
        assert_eq!(config.motors.len(), 1);

        let pan = &config.motors[0];
        assert_eq!(pan.name, "pan");
        assert_eq!(pan.frequency_prescaler, Some(2));
        assert_eq!(pan.motor.steps_per_revolution, 48);
        assert_eq!(pan.motor.address, 0x28);
        assert_eq!(pan.motor.rpm, Some(30));
        assert_eq!(pan.motor.scheduling, SchedulingPolicy::Cooperative);
        assert_eq!(pan.motor.address_commit, AddressCommit::Always);
        assert_eq!(pan.motor.energize_duty, 255); // default

        assert_eq!(pan.moves.len(), 2);
        assert_eq!(pan.moves[1].direction, Direction::Backward);
        assert_eq!(pan.moves[1].rpm, Some(60));
        assert_eq!(pan.moves[0].address, None);

        let change = pan.change_address.as_ref().unwrap();
        assert_eq!(change.new_address, 0x30);
        assert_eq!(change.persistence, Persistence::NoSave);
    }

    #[test]
    fn test_motor_defaults() {
        let config = load_config_str("[[motors]]\nname = \"bare\"\n").unwrap();
        let bare = &config.motors[0];
        assert_eq!(bare.motor, MotorConfig::default());
        assert!(bare.moves.is_empty());
        assert!(config.bus.shields.is_empty());
    }

    #[test]
    fn test_bad_direction_is_rejected() {
        let toml = r#"
[[motors]]
name = "m"

[[motors.moves]]
steps = 1
direction = "sideways"
"#;
        assert!(load_config_str(toml).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_config("config/does-not-exist.toml").is_err());
    }
}
