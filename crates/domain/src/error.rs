//! Common error types used across the workspace.
//!
//! Each concern has its own typed error; [`FanControlError`] gathers them
//! with `#[from]` conversions so callers can propagate with `?`.

use crate::group::Member;

/// Top-level error for the fan control engine.
#[derive(Debug, thiserror::Error)]
pub enum FanControlError {
    /// A cached or queried property value could not be obtained.
    ///
    /// Always recoverable: actions treat the member as absent.
    #[error("property {property} of {interface} on {path} is unavailable")]
    PropertyUnavailable {
        path: String,
        interface: String,
        property: String,
    },

    /// The service owning a path and interface could not be resolved.
    #[error("failed to resolve the service for {path} ({interface})")]
    ServiceResolution {
        path: String,
        interface: String,
        #[source]
        source: BusError,
    },

    /// A property bus call failed.
    #[error("property bus error")]
    Bus(#[from] BusError),

    /// Invalid or unmatched configuration.
    #[error("configuration error")]
    Config(#[from] ConfigError),

    /// Persisted state could not be read or written.
    #[error("persistence error")]
    Persist(#[from] PersistError),
}

impl FanControlError {
    /// Build a [`FanControlError::PropertyUnavailable`] for a group member.
    #[must_use]
    pub fn unavailable(member: &Member) -> Self {
        Self::PropertyUnavailable {
            path: member.path.clone(),
            interface: member.interface.clone(),
            property: member.property.clone(),
        }
    }
}

/// Failures reported by the property bus transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// Nothing on the bus provides the path and interface.
    #[error("no service provides {path} ({interface})")]
    ServiceNotFound { path: String, interface: String },

    /// The object exists but does not carry the requested property.
    #[error("no property {property} of {interface} on {path}")]
    NoSuchProperty {
        path: String,
        interface: String,
        property: String,
    },

    /// A method call returned an error reply.
    #[error("method {method} failed: {reason}")]
    MethodFailed { method: String, reason: String },

    /// The connection to the bus is gone.
    #[error("property bus disconnected")]
    Disconnected,
}

/// Configuration errors, all fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No zone group's conditions match the running platform.
    #[error("no zone group configuration matches this platform")]
    ConfigurationMismatch,

    /// A trigger asked for a timer that is neither one-shot nor repeating.
    #[error("invalid timer type `{0}`, expected `oneshot` or `repeating`")]
    InvalidTimerType(String),

    /// A request referenced a zone that was never constructed.
    #[error("zone {0} is not configured")]
    UnknownZone(usize),
}

/// Errors from the persisted-state store.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Reading or writing the backing file failed.
    #[error("failed to access persisted state at {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The stored content could not be decoded.
    #[error("persisted state at {path} is malformed: {reason}")]
    Malformed { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_name_member_in_unavailable_error() {
        let member = Member::new(
            "/xyz/openbmc_project/sensors/temperature/cpu0",
            "xyz.openbmc_project.Sensor.Value",
            "Value",
        );
        let err = FanControlError::unavailable(&member);
        assert_eq!(
            err.to_string(),
            "property Value of xyz.openbmc_project.Sensor.Value on \
             /xyz/openbmc_project/sensors/temperature/cpu0 is unavailable"
        );
    }

    #[test]
    fn should_convert_config_error_into_umbrella() {
        let err: FanControlError = ConfigError::ConfigurationMismatch.into();
        assert!(matches!(
            err,
            FanControlError::Config(ConfigError::ConfigurationMismatch)
        ));
    }

    #[test]
    fn should_display_invalid_timer_type() {
        let err = ConfigError::InvalidTimerType("sometimes".to_string());
        assert_eq!(
            err.to_string(),
            "invalid timer type `sometimes`, expected `oneshot` or `repeating`"
        );
    }

    #[test]
    fn should_keep_bus_error_as_source_of_service_resolution() {
        let err = FanControlError::ServiceResolution {
            path: "/a".to_string(),
            interface: "b".to_string(),
            source: BusError::Disconnected,
        };
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("property bus disconnected"));
    }
}
