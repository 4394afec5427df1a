//! Action: the closed set of zone-mutating building blocks.
//!
//! Each variant carries its parameters as data. The `app` crate interprets
//! them against a zone and a group; new behaviours need new variants.
//!
//! Numeric variants read group members as integers: `int64`, `int32`
//! (widened) or a sensor `Value` published as `double` (scaled by 1000).
//! Members of any other type count as unavailable.

use std::num::NonZeroI64;

use serde::{Deserialize, Serialize};

use crate::group::Member;
use crate::property::PropertyValue;
use crate::rule::{SetSpeedEvent, TimerConf};
use crate::table::SpeedTable;

/// A parameterized action run as `(zone, group)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Action {
    /// Toggle a timer that runs `actions` for the group on each expiry.
    TimerWrappedActions {
        timer: TimerConf,
        actions: Vec<Action>,
    },
    /// Force the floor to the default floor while any group service lacks an
    /// owner, blocking floor changes until all are owned again.
    DefaultFloorOnMissingOwner,
    /// Hold the zone at `speed` while any group service lacks an owner.
    SpeedOnMissingOwner { speed: u64 },
    /// Base speed requests on the maximum group value.
    RequestSpeedBaseWithMax,
    /// Hold the zone at `speed` once `count` members equal `state`.
    CountStateBeforeSpeed {
        count: usize,
        state: PropertyValue,
        speed: u64,
    },
    /// Floor from the average of available member values.
    FloorFromAverageSensorValue { table: SpeedTable },
    /// Ceiling from the average of available member values, with
    /// direction-aware transitions.
    CeilingFromAverageSensorValue { table: SpeedTable },
    /// Request an increase of `delta` per `factor` units above `state`.
    NetIncreaseSpeed {
        state: i64,
        factor: NonZeroI64,
        delta: u64,
    },
    /// Request a decrease of `delta` per `factor` units below `state`.
    NetDecreaseSpeed {
        state: i64,
        factor: NonZeroI64,
        delta: u64,
    },
    /// Swap between two rule sets depending on whether all members equal
    /// `state`.
    UseAlternateEventsOnState {
        state: PropertyValue,
        defaults: Vec<SetSpeedEvent>,
        alternates: Vec<SetSpeedEvent>,
    },
    /// Enable `events` only while all members equal `state`.
    UseEventsOnState {
        state: PropertyValue,
        events: Vec<SetSpeedEvent>,
    },
    /// Floor from the median of member values within `[lower, upper]`.
    FloorFromMedianSensorValue {
        lower: i64,
        upper: i64,
        table: SpeedTable,
    },
    /// Replace the default floor when all members equal `state`.
    UpdateDefaultFloor { state: PropertyValue, speed: u64 },
    /// Precondition: enable `events` only while every entry matches.
    PropertyStatesMatch {
        entries: Vec<StateEntry>,
        events: Vec<SetSpeedEvent>,
    },
    /// Precondition: enable `events` only while a group service lacks an
    /// owner.
    ServicesMissingOwner { events: Vec<SetSpeedEvent> },
}

impl Action {
    /// Whether this action gates other rules.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::PropertyStatesMatch { .. } | Self::ServicesMissingOwner { .. }
        )
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimerWrappedActions { timer, actions } => write!(
                f,
                "timer_wrapped_actions({:?} {}, {} actions)",
                timer.interval,
                timer.kind,
                actions.len()
            ),
            Self::DefaultFloorOnMissingOwner => f.write_str("default_floor_on_missing_owner"),
            Self::SpeedOnMissingOwner { speed } => write!(f, "speed_on_missing_owner({speed})"),
            Self::RequestSpeedBaseWithMax => f.write_str("request_speed_base_with_max"),
            Self::CountStateBeforeSpeed {
                count,
                state,
                speed,
            } => write!(f, "count_state_before_speed({count}, {state}, {speed})"),
            Self::FloorFromAverageSensorValue { table } => {
                write!(f, "floor_from_average_sensor_value({} steps)", table.len())
            }
            Self::CeilingFromAverageSensorValue { table } => {
                write!(f, "ceiling_from_average_sensor_value({} steps)", table.len())
            }
            Self::NetIncreaseSpeed {
                state,
                factor,
                delta,
            } => write!(f, "net_increase_speed({state}, {factor}, {delta})"),
            Self::NetDecreaseSpeed {
                state,
                factor,
                delta,
            } => write!(f, "net_decrease_speed({state}, {factor}, {delta})"),
            Self::UseAlternateEventsOnState { state, .. } => {
                write!(f, "use_alternate_events_on_state({state})")
            }
            Self::UseEventsOnState { state, .. } => write!(f, "use_events_on_state({state})"),
            Self::FloorFromMedianSensorValue { lower, upper, .. } => {
                write!(f, "floor_from_median_sensor_value({lower}..={upper})")
            }
            Self::UpdateDefaultFloor { state, speed } => {
                write!(f, "update_default_floor({state}, {speed})")
            }
            Self::PropertyStatesMatch { entries, .. } => {
                write!(f, "property_states_match({} entries)", entries.len())
            }
            Self::ServicesMissingOwner { events } => {
                write!(f, "services_missing_owner({} events)", events.len())
            }
        }
    }
}

/// A (member, expected value) pair checked by
/// [`Action::PropertyStatesMatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    #[serde(flatten)]
    pub member: Member,
    pub value: PropertyValue,
}
