//! Static zone and fan definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rule::SetSpeedEvent;

/// Interface fan rotor objects expose their speed target under by default.
pub const DEFAULT_TARGET_INTERFACE: &str = "xyz.openbmc_project.Control.FanSpeed";

/// Process-wide operating mode, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Full speed, settle, signal readiness. No rules are armed.
    Init,
    /// Normal rule-driven operation.
    Control,
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::Control => f.write_str("control"),
        }
    }
}

/// A fan and the rotor sensor objects its target is written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanDefinition {
    pub name: String,
    pub sensors: Vec<String>,
    #[serde(default = "default_target_interface")]
    pub target_interface: String,
}

fn default_target_interface() -> String {
    DEFAULT_TARGET_INTERFACE.to_string()
}

/// Initial values for the zone's exposed thermal mode properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "property", rename_all = "snake_case")]
pub enum ZoneHandler {
    SupportedModes {
        modes: Vec<String>,
        #[serde(default)]
        persist: bool,
    },
    CurrentMode {
        mode: String,
        #[serde(default)]
        persist: bool,
    },
}

/// One fan zone: fans, speed bounds, hysteresis timings and rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDefinition {
    pub number: usize,
    pub full_speed: u64,
    pub default_floor: u64,
    #[serde(with = "crate::serde_secs")]
    pub increase_delay: Duration,
    #[serde(with = "crate::serde_secs")]
    pub decrease_interval: Duration,
    #[serde(default)]
    pub handlers: Vec<ZoneHandler>,
    pub fans: Vec<FanDefinition>,
    #[serde(default)]
    pub events: Vec<SetSpeedEvent>,
}
