//! Action interpreter.
//!
//! [`run`] evaluates one [`Action`] against a zone and a group. Member
//! values that cannot be obtained are skipped: they drop out of counts,
//! averages and medians and never abort the action.

use std::num::NonZeroI64;

use fanzone_domain::error::FanControlError;
use fanzone_domain::group::{Group, Member};
use fanzone_domain::property::PropertyValue;
use fanzone_domain::rule::{Action, SetSpeedEvent, TimerConf};
use fanzone_domain::table::SpeedTable;

use crate::ports::{ModeStore, PropertyBus};
use crate::preconditions;
use crate::utility::{average, median};
use crate::zone::Zone;

/// Name the timers of [`Action::TimerWrappedActions`] are registered under.
pub const TIMER_ACTIONS_EVENT: &str = "timer_wrapped_actions";

/// Run `action` for `group`.
pub fn run<B: PropertyBus, S: ModeStore>(zone: &mut Zone<B, S>, group: &Group, action: &Action) {
    match action {
        Action::TimerWrappedActions { timer, actions } => {
            toggle_timer(zone, group, actions, *timer);
        }
        Action::DefaultFloorOnMissingOwner => default_floor_on_missing_owner(zone, group),
        Action::SpeedOnMissingOwner { speed } => speed_on_missing_owner(zone, group, *speed),
        Action::RequestSpeedBaseWithMax => request_speed_base_with_max(zone, group),
        Action::CountStateBeforeSpeed {
            count,
            state,
            speed,
        } => count_state_before_speed(zone, group, *count, state, *speed),
        Action::FloorFromAverageSensorValue { table } => {
            floor_from_average_sensor_value(zone, group, table);
        }
        Action::CeilingFromAverageSensorValue { table } => {
            ceiling_from_average_sensor_value(zone, group, table);
        }
        Action::NetIncreaseSpeed {
            state,
            factor,
            delta,
        } => net_increase_speed(zone, group, *state, *factor, *delta),
        Action::NetDecreaseSpeed {
            state,
            factor,
            delta,
        } => net_decrease_speed(zone, group, *state, *factor, *delta),
        Action::UseAlternateEventsOnState {
            state,
            defaults,
            alternates,
        } => use_alternate_events_on_state(zone, group, state, defaults, alternates),
        Action::UseEventsOnState { state, events } => {
            use_events_on_state(zone, group, state, events);
        }
        Action::FloorFromMedianSensorValue {
            lower,
            upper,
            table,
        } => floor_from_median_sensor_value(zone, group, *lower, *upper, table),
        Action::UpdateDefaultFloor { state, speed } => {
            if all_at_state(zone, group, state) {
                zone.set_default_floor(*speed);
            }
        }
        Action::PropertyStatesMatch { entries, events } => {
            preconditions::property_states_match(zone, group, entries, events);
        }
        Action::ServicesMissingOwner { events } => {
            preconditions::services_missing_owner(zone, group, events);
        }
    }
}

/// Start a timer running `actions` for `group`, or stop the one already
/// running them.
fn toggle_timer<B: PropertyBus, S: ModeStore>(
    zone: &mut Zone<B, S>,
    group: &Group,
    actions: &[Action],
    timer: TimerConf,
) {
    match zone.find_timer(TIMER_ACTIONS_EVENT, group, actions) {
        Some(index) => zone.remove_timer(TIMER_ACTIONS_EVENT, index),
        None => zone.add_timer(TIMER_ACTIONS_EVENT, group.clone(), actions.to_vec(), timer),
    }
}

fn default_floor_on_missing_owner<B: PropertyBus, S: ModeStore>(zone: &mut Zone<B, S>, group: &Group) {
    zone.set_services(group);
    let missing = zone.any_missing_owner(group);
    if missing {
        let floor = zone.default_floor();
        zone.set_floor(floor);
    }
    zone.set_floor_change_allow(group, !missing);
}

fn speed_on_missing_owner<B: PropertyBus, S: ModeStore>(zone: &mut Zone<B, S>, group: &Group, speed: u64) {
    zone.set_services(group);
    let missing = zone.any_missing_owner(group);
    if missing {
        zone.set_speed(speed);
    }
    zone.set_active_allow(group, !missing);
}

fn request_speed_base_with_max<B: PropertyBus, S: ModeStore>(zone: &mut Zone<B, S>, group: &Group) {
    let max = available_values(zone, group).into_iter().max().unwrap_or(0);
    zone.set_request_speed_base(u64::try_from(max).unwrap_or(0));
}

fn count_state_before_speed<B: PropertyBus, S: ModeStore>(
    zone: &mut Zone<B, S>,
    group: &Group,
    count: usize,
    state: &PropertyValue,
    speed: u64,
) {
    let at_state = group
        .iter()
        .filter(|member| is_at_state(zone, member, state))
        .count();
    let reached = at_state >= count;
    if reached {
        zone.set_speed(speed);
    }
    zone.set_active_allow(group, !reached);
}

fn floor_from_average_sensor_value<B: PropertyBus, S: ModeStore>(
    zone: &mut Zone<B, S>,
    group: &Group,
    table: &SpeedTable,
) {
    let values = available_values(zone, group);
    match average(&values) {
        Some(mean) => {
            if let Some(speed) = table.first_above(mean) {
                zone.set_floor(speed);
            }
        }
        None => {
            let floor = zone.default_floor();
            zone.set_floor(floor);
        }
    }
}

fn ceiling_from_average_sensor_value<B: PropertyBus, S: ModeStore>(
    zone: &mut Zone<B, S>,
    group: &Group,
    table: &SpeedTable,
) {
    let Some(mean) = average(&available_values(zone, group)) else {
        return;
    };
    let previous = zone.swap_ceiling_key_value(mean);
    if let Some(speed) = crossed_ceiling(table, previous, mean) {
        zone.set_ceiling(speed);
    }
}

/// Ceiling for a mean moving from `previous` to `current`.
///
/// Only keys crossed in the direction of travel count; the first and last
/// entries apply at the extremes. `None` keeps the current ceiling.
fn crossed_ceiling(table: &SpeedTable, previous: i64, current: i64) -> Option<u64> {
    let last = table.len().checked_sub(1)?;
    let mut speed = None;
    if current < previous {
        for (position, (key, value)) in table.iter().rev().enumerate() {
            if (position == 0 && current >= key) || (position == last && current <= key) {
                return Some(value);
            }
            if current < key && key <= previous {
                speed = Some(value);
            }
        }
    } else if current > previous {
        for (position, (key, value)) in table.iter().enumerate() {
            if (position == 0 && current <= key) || (position == last && current >= key) {
                return Some(value);
            }
            if current > key && key >= previous {
                speed = Some(value);
            }
        }
    }
    speed
}

fn net_increase_speed<B: PropertyBus, S: ModeStore>(
    zone: &mut Zone<B, S>,
    group: &Group,
    state: i64,
    factor: NonZeroI64,
    delta: u64,
) {
    let mut net = zone.inc_delta();
    for value in available_values(zone, group) {
        if value >= state {
            // at least one factor step so a value sitting at the state still
            // pushes the speed up
            let over = value.saturating_sub(state).max(factor.get());
            net = net.max(scaled_delta(over, factor, delta));
        }
    }
    zone.request_speed_increase(net);
}

fn net_decrease_speed<B: PropertyBus, S: ModeStore>(
    zone: &mut Zone<B, S>,
    group: &Group,
    state: i64,
    factor: NonZeroI64,
    delta: u64,
) {
    let mut net = zone.dec_delta();
    for value in available_values(zone, group) {
        if value < state {
            let requested = scaled_delta(state.saturating_sub(value), factor, delta);
            net = if net == 0 { requested } else { net.min(requested) };
        } else {
            net = 0;
            break;
        }
    }
    zone.set_decrease_allow(group, net != 0);
    zone.request_speed_decrease(net);
}

/// `(difference / factor) * delta`, zero when negative.
fn scaled_delta(difference: i64, factor: NonZeroI64, delta: u64) -> u64 {
    u64::try_from(difference / factor.get())
        .unwrap_or(0)
        .saturating_mul(delta)
}

fn use_alternate_events_on_state<B: PropertyBus, S: ModeStore>(
    zone: &mut Zone<B, S>,
    group: &Group,
    state: &PropertyValue,
    defaults: &[SetSpeedEvent],
    alternates: &[SetSpeedEvent],
) {
    let (remove, init) = if all_at_state(zone, group, state) {
        (defaults, alternates)
    } else {
        (alternates, defaults)
    };
    for event in remove {
        zone.remove_event(event);
    }
    for event in init {
        zone.init_event(event);
    }
}

fn use_events_on_state<B: PropertyBus, S: ModeStore>(
    zone: &mut Zone<B, S>,
    group: &Group,
    state: &PropertyValue,
    events: &[SetSpeedEvent],
) {
    if all_at_state(zone, group, state) {
        for event in events {
            zone.init_event(event);
        }
    } else {
        for event in events {
            zone.remove_event(event);
        }
    }
}

fn floor_from_median_sensor_value<B: PropertyBus, S: ModeStore>(
    zone: &mut Zone<B, S>,
    group: &Group,
    lower: i64,
    upper: i64,
    table: &SpeedTable,
) {
    let values: Vec<i64> = available_values(zone, group)
        .into_iter()
        .filter(|value| (lower..=upper).contains(value))
        .collect();
    let representative = match values.as_slice() {
        [] => None,
        // two sensors: bias towards the hotter one
        [a, b] => Some(*a.max(b)),
        _ => median(&values),
    };
    match representative {
        Some(value) => {
            if let Some(speed) = table.first_above(value) {
                zone.set_floor(speed);
            }
        }
        None => {
            let floor = zone.default_floor();
            zone.set_floor(floor);
        }
    }
}

/// Integer values of every readable member, in group order.
fn available_values<B: PropertyBus, S: ModeStore>(zone: &mut Zone<B, S>, group: &Group) -> Vec<i64> {
    let mut values = Vec::with_capacity(group.len());
    for member in group {
        match integer_value(zone, member) {
            Ok(value) => values.push(value),
            Err(err) => tracing::debug!(zone = zone.number(), %err, "skipping member"),
        }
    }
    values
}

/// `member` as an integer: `int64` (including a scaled sensor `Value`) or a
/// widened `int32`. Any other type is unavailable.
fn integer_value<B: PropertyBus, S: ModeStore>(
    zone: &mut Zone<B, S>,
    member: &Member,
) -> Result<i64, FanControlError> {
    let value = zone.property(member)?;
    value
        .get::<i64>(&member.interface, &member.property)
        .or_else(|| value.get::<i32>(&member.interface, &member.property).map(i64::from))
        .ok_or_else(|| FanControlError::unavailable(member))
}

fn is_at_state<B: PropertyBus, S: ModeStore>(
    zone: &mut Zone<B, S>,
    member: &Member,
    state: &PropertyValue,
) -> bool {
    zone.property(member)
        .is_ok_and(|value| state.matches(&value, &member.interface, &member.property))
}

/// Whether every member currently equals `state`; unreadable members never
/// do.
pub(crate) fn all_at_state<B: PropertyBus, S: ModeStore>(
    zone: &mut Zone<B, S>,
    group: &Group,
    state: &PropertyValue,
) -> bool {
    group.iter().all(|member| is_at_state(zone, member, state))
}
