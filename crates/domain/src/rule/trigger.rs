//! Trigger: what causes a rule's actions to run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Binds a rule's actions to a timer, a bus signal, or initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Runs the actions on every expiry of a one-shot or repeating timer.
    Timer(TimerConf),
    /// Runs the actions when a matching signal is delivered for any member.
    Signal { signal: SignalKind },
    /// Runs the actions once when the rule is initialized, optionally after
    /// populating state through `method`.
    Init {
        #[serde(default)]
        method: Option<InitMethod>,
    },
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timer(conf) => write!(f, "timer({:?}, {})", conf.interval, conf.kind),
            Self::Signal { signal } => write!(f, "signal({signal:?})"),
            Self::Init { method: Some(m) } => write!(f, "init({m:?})"),
            Self::Init { method: None } => f.write_str("init"),
        }
    }
}

/// Bus signal a [`Trigger::Signal`] subscribes to for each group member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Member's property changed; the new value is cached.
    PropertiesChanged,
    /// Member's interface appeared; the carried value is cached.
    InterfacesAdded,
    /// Member's interface went away; its cached values are dropped.
    InterfacesRemoved,
    /// Ownership of the member's service changed.
    NameOwnerChanged,
}

/// State-population step run before an init trigger's actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMethod {
    /// Query every member's property and cache it.
    GetProperties,
    /// Resolve every member's service and record whether it has an owner.
    NameHasOwner,
}

/// Timer parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConf {
    #[serde(with = "crate::serde_secs")]
    pub interval: Duration,
    pub kind: TimerType,
}

impl TimerConf {
    #[must_use]
    pub fn oneshot(interval: Duration) -> Self {
        Self {
            interval,
            kind: TimerType::Oneshot,
        }
    }

    #[must_use]
    pub fn repeating(interval: Duration) -> Self {
        Self {
            interval,
            kind: TimerType::Repeating,
        }
    }
}

/// Whether a timer fires once or on every interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimerType {
    Oneshot,
    Repeating,
}

impl std::str::FromStr for TimerType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oneshot" => Ok(Self::Oneshot),
            "repeating" => Ok(Self::Repeating),
            other => Err(ConfigError::InvalidTimerType(other.to_string())),
        }
    }
}

impl TryFrom<String> for TimerType {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimerType> for String {
    fn from(value: TimerType) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for TimerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Oneshot => f.write_str("oneshot"),
            Self::Repeating => f.write_str("repeating"),
        }
    }
}
