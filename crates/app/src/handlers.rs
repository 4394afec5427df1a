//! Signal handlers: fold a delivered signal into zone state before the
//! bound actions run.

use fanzone_domain::group::{Group, Member};

use crate::ports::{BusSignal, ModeStore, PropertyBus};
use crate::zone::Zone;

/// Apply `signal` to the zone on behalf of one subscribed `member`.
///
/// - properties changed / interfaces added: cache the member's carried value
/// - interfaces removed: forget the member's interface
/// - name owner changed: update the group's ownership record
pub(crate) fn handle<B: PropertyBus, S: ModeStore>(
    zone: &mut Zone<B, S>,
    group: &Group,
    member: &Member,
    signal: &BusSignal,
) {
    match signal {
        BusSignal::PropertiesChanged {
            path,
            interface,
            changed,
        } => {
            if *interface != member.interface {
                return;
            }
            if let Some(value) = changed.get(&member.property) {
                zone.set_value(path, interface, &member.property, value.clone());
            }
        }
        BusSignal::InterfacesAdded { path, interfaces } => {
            if let Some(value) = interfaces
                .get(&member.interface)
                .and_then(|properties| properties.get(&member.property))
            {
                zone.set_value(path, &member.interface, &member.property, value.clone());
            }
        }
        BusSignal::InterfacesRemoved { path, interfaces } => {
            if interfaces.contains(&member.interface) {
                zone.remove_interface(path, &member.interface);
            }
        }
        BusSignal::NameOwnerChanged {
            name, new_owner, ..
        } => {
            zone.set_service_owner(group, name, !new_owner.is_empty());
        }
        // routed by the manager, never matched by a subscription
        BusSignal::SetPropertyRequested { .. } => {}
    }
}
