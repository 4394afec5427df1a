//! # fanzone-adapter-virtual-bus
//!
//! In-memory implementation of the `PropertyBus` port. It stands in for the
//! platform bus when simulating a machine or testing the engine end to end.
//!
//! ## Model
//!
//! | Concept | Held as |
//! |---------|---------|
//! | Object | a path served by exactly one service |
//! | Interface | a property map on an object |
//! | Name owner | per-service flag, toggled with [`VirtualBus::set_owner`] |
//! | Signal | broadcast to every subscriber on each mutation |
//!
//! Calls against a service without an owner fail the way a real bus would.
//!
//! Objects the engine publishes are served under [`LOCAL_SERVICE`]. Writes
//! to them are not applied: they reach the engine as
//! `SetPropertyRequested` signals and the engine publishes the outcome.
//!
//! ## Dependency rule
//!
//! Depends on `fanzone-app` (port traits) and `fanzone-domain` only.

mod object;

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use fanzone_app::ports::{BusSignal, PropertyBus, PropertyMap, SubTree};
use fanzone_domain::error::BusError;
use fanzone_domain::property::PropertyValue;

use object::Object;

const SIGNAL_CAPACITY: usize = 256;

/// Service name the engine's own objects are served under.
pub const LOCAL_SERVICE: &str = "xyz.openbmc_project.Control.Thermal";

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Object>,
    owners: BTreeMap<String, Option<String>>,
    matches: Vec<String>,
    units: Vec<String>,
    next_owner: u32,
}

impl State {
    fn owned(&self, service: &str) -> bool {
        matches!(self.owners.get(service), Some(Some(_)))
    }

    fn allocate_owner(&mut self) -> String {
        self.next_owner += 1;
        format!(":1.{}", self.next_owner)
    }
}

/// Simulated property bus.
pub struct VirtualBus {
    state: Mutex<State>,
    signals: Mutex<Option<broadcast::Sender<BusSignal>>>,
}

impl Default for VirtualBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            state: Mutex::new(State::default()),
            signals: Mutex::new(Some(sender)),
        }
    }
}

impl VirtualBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, signal: BusSignal) {
        let signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = signals.as_ref() {
            // no subscribers is not an error
            let _ = sender.send(signal);
        }
    }

    /// Publish `interface` with `properties` on `path`, served by `service`.
    ///
    /// The service gains an owner if it had none. Emits `InterfacesAdded`.
    pub fn add_interface(&self, service: &str, path: &str, interface: &str, properties: PropertyMap) {
        {
            let mut state = self.state();
            if !state.owned(service) {
                let owner = state.allocate_owner();
                state.owners.insert(service.to_string(), Some(owner));
            }
            state
                .objects
                .entry(path.to_string())
                .or_insert_with(|| Object::new(service))
                .insert_interface(service, interface, properties.clone());
        }
        tracing::debug!(service, path, interface, "interface added");
        self.emit(BusSignal::InterfacesAdded {
            path: path.to_string(),
            interfaces: BTreeMap::from([(interface.to_string(), properties)]),
        });
    }

    /// Remove `interface` from `path`, dropping the object once it is empty.
    ///
    /// Emits `InterfacesRemoved` when the interface existed.
    pub fn remove_interface(&self, path: &str, interface: &str) {
        let removed = {
            let mut state = self.state();
            let removed = state
                .objects
                .get_mut(path)
                .is_some_and(|object| object.remove_interface(interface));
            if state.objects.get(path).is_some_and(Object::is_empty) {
                state.objects.remove(path);
            }
            removed
        };
        if removed {
            tracing::debug!(path, interface, "interface removed");
            self.emit(BusSignal::InterfacesRemoved {
                path: path.to_string(),
                interfaces: vec![interface.to_string()],
            });
        }
    }

    /// Change a property from the service side.
    ///
    /// Emits `PropertiesChanged` when the value differs from the stored one.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NoSuchProperty`] when the interface is not
    /// published on `path`.
    pub fn update_property(
        &self,
        path: &str,
        interface: &str,
        property: &str,
        value: PropertyValue,
    ) -> Result<(), BusError> {
        let changed = self
            .state()
            .objects
            .get_mut(path)
            .and_then(|object| object.store(interface, property, value.clone()))
            .ok_or_else(|| no_such_property(path, interface, property))?;
        if changed {
            self.emit(BusSignal::PropertiesChanged {
                path: path.to_string(),
                interface: interface.to_string(),
                changed: BTreeMap::from([(property.to_string(), value)]),
            });
        }
        Ok(())
    }

    /// Give `service` an owner or take it away.
    ///
    /// Emits `NameOwnerChanged` when the ownership actually changes.
    pub fn set_owner(&self, service: &str, owned: bool) {
        let transition = {
            let mut state = self.state();
            let old = state.owners.get(service).cloned().flatten();
            let new = match (&old, owned) {
                (Some(current), true) => Some(current.clone()),
                (None, true) => Some(state.allocate_owner()),
                (_, false) => None,
            };
            state.owners.insert(service.to_string(), new.clone());
            (old != new).then(|| (old.unwrap_or_default(), new.unwrap_or_default()))
        };
        if let Some((old_owner, new_owner)) = transition {
            tracing::debug!(service, owned, "name owner changed");
            self.emit(BusSignal::NameOwnerChanged {
                name: service.to_string(),
                old_owner,
                new_owner,
            });
        }
    }

    /// Close the signal stream, as when the bus connection drops.
    pub fn disconnect(&self) {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        tracing::warn!("virtual bus disconnected");
    }

    /// Current value of a property, regardless of service ownership.
    #[must_use]
    pub fn property(&self, path: &str, interface: &str, property: &str) -> Option<PropertyValue> {
        self.state()
            .objects
            .get(path)
            .and_then(|object| object.value(interface, property))
            .cloned()
    }

    /// Match rules currently registered.
    #[must_use]
    pub fn matches(&self) -> Vec<String> {
        self.state().matches.clone()
    }

    /// Units started so far, in order.
    #[must_use]
    pub fn started_units(&self) -> Vec<String> {
        self.state().units.clone()
    }
}

fn no_such_property(path: &str, interface: &str, property: &str) -> BusError {
    BusError::NoSuchProperty {
        path: path.to_string(),
        interface: interface.to_string(),
        property: property.to_string(),
    }
}

fn not_owned(method: &str, service: &str) -> BusError {
    BusError::MethodFailed {
        method: method.to_string(),
        reason: format!("service {service} has no owner"),
    }
}

fn is_below(path: &str, root: &str) -> bool {
    root == "/"
        || path == root
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

impl PropertyBus for VirtualBus {
    fn get_service(&self, path: &str, interface: &str) -> Result<String, BusError> {
        let state = self.state();
        state
            .objects
            .get(path)
            .filter(|object| object.has_interface(interface) && state.owned(object.service()))
            .map(|object| object.service().to_string())
            .ok_or_else(|| BusError::ServiceNotFound {
                path: path.to_string(),
                interface: interface.to_string(),
            })
    }

    fn get_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<PropertyValue, BusError> {
        let state = self.state();
        if !state.owned(service) {
            return Err(not_owned("Get", service));
        }
        state
            .objects
            .get(path)
            .filter(|object| object.service() == service)
            .and_then(|object| object.value(interface, property))
            .cloned()
            .ok_or_else(|| no_such_property(path, interface, property))
    }

    fn set_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
        value: PropertyValue,
    ) -> Result<(), BusError> {
        {
            let state = self.state();
            if !state.owned(service) {
                return Err(not_owned("Set", service));
            }
            if !state
                .objects
                .get(path)
                .is_some_and(|object| object.service() == service)
            {
                return Err(no_such_property(path, interface, property));
            }
        }
        if service == LOCAL_SERVICE {
            tracing::debug!(path, interface, property, %value, "write requested");
            self.emit(BusSignal::SetPropertyRequested {
                path: path.to_string(),
                interface: interface.to_string(),
                property: property.to_string(),
                value,
            });
            return Ok(());
        }
        self.update_property(path, interface, property, value)
    }

    fn get_sub_tree(&self, path: &str, interface: &str, _depth: i32) -> Result<SubTree, BusError> {
        let state = self.state();
        Ok(state
            .objects
            .iter()
            .filter(|(object_path, object)| {
                is_below(object_path, path)
                    && object.has_interface(interface)
                    && state.owned(object.service())
            })
            .map(|(object_path, object)| {
                (
                    object_path.clone(),
                    BTreeMap::from([(object.service().to_string(), object.interfaces())]),
                )
            })
            .collect())
    }

    fn name_has_owner(&self, name: &str) -> Result<bool, BusError> {
        Ok(self.state().owned(name))
    }

    fn add_match(&self, rule: &str) -> Result<(), BusError> {
        tracing::trace!(rule, "match added");
        self.state().matches.push(rule.to_string());
        Ok(())
    }

    fn remove_match(&self, rule: &str) -> Result<(), BusError> {
        let mut state = self.state();
        if let Some(index) = state.matches.iter().position(|m| m == rule) {
            state.matches.remove(index);
        }
        Ok(())
    }

    fn start_unit(&self, unit: &str) -> Result<(), BusError> {
        tracing::info!(unit, "unit started");
        self.state().units.push(unit.to_string());
        Ok(())
    }

    fn publish(&self, path: &str, interface: &str, properties: PropertyMap) -> Result<(), BusError> {
        let served = self.state().objects.get(path).is_some_and(|object| {
            object.service() == LOCAL_SERVICE && object.has_interface(interface)
        });
        if !served {
            self.add_interface(LOCAL_SERVICE, path, interface, properties);
            return Ok(());
        }
        for (property, value) in properties {
            self.update_property(path, interface, &property, value)?;
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<BusSignal> {
        let signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        match signals.as_ref() {
            Some(sender) => sender.subscribe(),
            // already closed: hand out a receiver whose sender is gone
            None => broadcast::channel(1).1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENSOR: &str = "xyz.openbmc_project.Sensor.Value";

    fn props(value: i64) -> PropertyMap {
        BTreeMap::from([("Value".to_string(), PropertyValue::Int64(value))])
    }

    fn bus_with_sensor() -> VirtualBus {
        let bus = VirtualBus::new();
        bus.add_interface("hwmon", "/sensors/cpu0", SENSOR, props(40_000));
        bus
    }

    #[test]
    fn should_resolve_service_for_published_interface() {
        let bus = bus_with_sensor();
        assert_eq!(bus.get_service("/sensors/cpu0", SENSOR).unwrap(), "hwmon");
        assert!(matches!(
            bus.get_service("/sensors/cpu0", "other.Interface"),
            Err(BusError::ServiceNotFound { .. })
        ));
    }

    #[test]
    fn should_read_property_from_owning_service() {
        let bus = bus_with_sensor();
        let value = bus.get_property("hwmon", "/sensors/cpu0", SENSOR, "Value").unwrap();
        assert_eq!(value, PropertyValue::Int64(40_000));
    }

    #[test]
    fn should_fail_calls_when_service_has_no_owner() {
        let bus = bus_with_sensor();
        bus.set_owner("hwmon", false);
        assert!(!bus.name_has_owner("hwmon").unwrap());
        assert!(matches!(
            bus.get_property("hwmon", "/sensors/cpu0", SENSOR, "Value"),
            Err(BusError::MethodFailed { .. })
        ));
        assert!(bus.get_service("/sensors/cpu0", SENSOR).is_err());
    }

    #[test]
    fn should_emit_properties_changed_only_on_actual_change() {
        let bus = bus_with_sensor();
        let mut rx = bus.subscribe();
        bus.update_property("/sensors/cpu0", SENSOR, "Value", PropertyValue::Int64(40_000))
            .unwrap();
        bus.update_property("/sensors/cpu0", SENSOR, "Value", PropertyValue::Int64(45_000))
            .unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            BusSignal::PropertiesChanged {
                path: "/sensors/cpu0".to_string(),
                interface: SENSOR.to_string(),
                changed: props(45_000),
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn should_emit_set_property_writes() {
        let bus = bus_with_sensor();
        let mut rx = bus.subscribe();
        bus.set_property("hwmon", "/sensors/cpu0", SENSOR, "Value", PropertyValue::Int64(1))
            .unwrap();
        assert!(matches!(rx.try_recv(), Ok(BusSignal::PropertiesChanged { .. })));
        assert_eq!(
            bus.property("/sensors/cpu0", SENSOR, "Value"),
            Some(PropertyValue::Int64(1))
        );
    }

    #[test]
    fn should_announce_then_update_published_object() {
        let bus = VirtualBus::new();
        let mut rx = bus.subscribe();
        let current = |mode: &str| BTreeMap::from([("Current".to_string(), PropertyValue::from(mode))]);

        bus.publish("/control/0", "Mode", current("DEFAULT")).unwrap();
        bus.publish("/control/0", "Mode", current("DEFAULT")).unwrap();
        bus.publish("/control/0", "Mode", current("ACOUSTIC")).unwrap();

        assert!(matches!(rx.try_recv(), Ok(BusSignal::InterfacesAdded { .. })));
        assert_eq!(
            rx.try_recv().unwrap(),
            BusSignal::PropertiesChanged {
                path: "/control/0".to_string(),
                interface: "Mode".to_string(),
                changed: current("ACOUSTIC"),
            }
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(bus.get_service("/control/0", "Mode").unwrap(), LOCAL_SERVICE);
    }

    #[test]
    fn should_forward_writes_to_published_object_without_applying_them() {
        let bus = VirtualBus::new();
        bus.publish(
            "/control/0",
            "Mode",
            BTreeMap::from([("Current".to_string(), PropertyValue::from("DEFAULT"))]),
        )
        .unwrap();
        let mut rx = bus.subscribe();

        bus.set_property(LOCAL_SERVICE, "/control/0", "Mode", "Current", PropertyValue::from("acoustic"))
            .unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            BusSignal::SetPropertyRequested {
                path: "/control/0".to_string(),
                interface: "Mode".to_string(),
                property: "Current".to_string(),
                value: PropertyValue::from("acoustic"),
            }
        );
        assert_eq!(
            bus.property("/control/0", "Mode", "Current"),
            Some(PropertyValue::from("DEFAULT"))
        );
    }

    #[test]
    fn should_emit_name_owner_transitions() {
        let bus = bus_with_sensor();
        let mut rx = bus.subscribe();
        bus.set_owner("hwmon", false);
        bus.set_owner("hwmon", false);
        bus.set_owner("hwmon", true);

        let Ok(BusSignal::NameOwnerChanged { old_owner, new_owner, .. }) = rx.try_recv() else {
            panic!("expected a name owner change");
        };
        assert!(!old_owner.is_empty());
        assert!(new_owner.is_empty());
        let Ok(BusSignal::NameOwnerChanged { old_owner, new_owner, .. }) = rx.try_recv() else {
            panic!("expected a name owner change");
        };
        assert!(old_owner.is_empty());
        assert!(!new_owner.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn should_list_sub_tree_below_root() {
        let bus = bus_with_sensor();
        bus.add_interface("hwmon", "/sensors/cpu1", SENSOR, props(1));
        bus.add_interface("other", "/elsewhere/x", SENSOR, props(1));
        let tree = bus.get_sub_tree("/sensors", SENSOR, 0).unwrap();
        assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["/sensors/cpu0", "/sensors/cpu1"]);
        assert_eq!(bus.get_sub_tree("/", SENSOR, 0).unwrap().len(), 3);
    }

    #[test]
    fn should_drop_object_when_last_interface_removed() {
        let bus = bus_with_sensor();
        let mut rx = bus.subscribe();
        bus.remove_interface("/sensors/cpu0", SENSOR);
        bus.remove_interface("/sensors/cpu0", SENSOR);
        assert!(matches!(rx.try_recv(), Ok(BusSignal::InterfacesRemoved { .. })));
        assert!(rx.try_recv().is_err());
        assert!(bus.property("/sensors/cpu0", SENSOR, "Value").is_none());
    }

    #[test]
    fn should_track_matches_and_units() {
        let bus = VirtualBus::new();
        bus.add_match("type='signal'").unwrap();
        bus.add_match("type='signal'").unwrap();
        bus.remove_match("type='signal'").unwrap();
        bus.start_unit("ready.target").unwrap();
        assert_eq!(bus.matches(), vec!["type='signal'".to_string()]);
        assert_eq!(bus.started_units(), vec!["ready.target".to_string()]);
    }

    #[test]
    fn should_close_receivers_on_disconnect() {
        let bus = VirtualBus::new();
        let mut rx = bus.subscribe();
        bus.disconnect();
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        ));
        assert!(matches!(
            bus.subscribe().try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        ));
    }
}
