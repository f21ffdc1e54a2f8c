use std::env;

use thiserror::Error;

use crate::transport::BusAddress;

#[derive(Debug, Clone)]
pub struct Config {
    pub bus: BusAddress,
    /// Whether monitors started by the CLI also follow UnitNew/UnitRemoved
    /// signals instead of refreshing only on demand.
    pub follow_signals: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SYSTEMD_BUS must be \"system\" or \"session\"")]
    InvalidBus,
    #[error("SYSTEMD_FOLLOW_SIGNALS must be \"true\" or \"false\"")]
    InvalidFollowSignals,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bus = match env::var("SYSTEMD_BUS") {
            Err(_) => BusAddress::System,
            Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
                "" | "system" => BusAddress::System,
                "session" => BusAddress::Session,
                _ => return Err(ConfigError::InvalidBus),
            },
        };

        let follow_signals = match env::var("SYSTEMD_FOLLOW_SIGNALS") {
            Err(_) => true,
            Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
                "" | "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(ConfigError::InvalidFollowSignals),
            },
        };

        Ok(Self {
            bus,
            follow_signals,
        })
    }
}
