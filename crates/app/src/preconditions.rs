//! Preconditions: actions that gate whether other rules are active.
//!
//! They are bound through init and signal triggers like any other action,
//! so the same init/remove machinery both bootstraps the zone and re-scopes
//! it at runtime.

use fanzone_domain::group::Group;
use fanzone_domain::rule::{SetSpeedEvent, StateEntry};

use crate::ports::{ModeStore, PropertyBus};
use crate::zone::Zone;

/// Enable `events` while every entry matches its expected value.
///
/// On a mismatch the events are removed and the zone goes to full speed.
/// The result is also recorded as the group's active-allowed vote.
pub(crate) fn property_states_match<B: PropertyBus, S: ModeStore>(
    zone: &mut Zone<B, S>,
    group: &Group,
    entries: &[StateEntry],
    events: &[SetSpeedEvent],
) {
    let matched = entries.iter().all(|entry| {
        let member = &entry.member;
        zone.property(member)
            .is_ok_and(|value| entry.value.matches(&value, &member.interface, &member.property))
    });
    if matched {
        tracing::debug!(zone = zone.number(), "preconditions met");
        for event in events {
            zone.init_event(event);
        }
    } else {
        tracing::debug!(zone = zone.number(), "preconditions not met, going to full speed");
        for event in events {
            zone.remove_event(event);
        }
        zone.set_full_speed();
    }
    zone.set_active_allow(group, matched);
}

/// Enable `events` while any service of the group lacks an owner.
pub(crate) fn services_missing_owner<B: PropertyBus, S: ModeStore>(
    zone: &mut Zone<B, S>,
    group: &Group,
    events: &[SetSpeedEvent],
) {
    zone.set_services(group);
    if zone.any_missing_owner(group) {
        for event in events {
            zone.init_event(event);
        }
    } else {
        for event in events {
            zone.remove_event(event);
        }
    }
}
