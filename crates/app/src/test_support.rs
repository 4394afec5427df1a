//! In-memory port implementations shared by the unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use fanzone_domain::error::{BusError, PersistError};
use fanzone_domain::property::PropertyValue;

use crate::ports::{BusSignal, ModeStore, PropertyBus, PropertyMap, SubTree};

type Key = (String, String, String);

#[derive(Default)]
struct FakeState {
    values: BTreeMap<Key, PropertyValue>,
    tree: SubTree,
    owners: BTreeMap<String, bool>,
    matches: Vec<String>,
    writes: Vec<(Key, PropertyValue)>,
    units: Vec<String>,
    published: BTreeMap<(String, String), PropertyMap>,
    sub_tree_calls: usize,
}

pub(crate) struct FakeBus {
    state: Mutex<FakeState>,
    signals: broadcast::Sender<BusSignal>,
}

impl FakeBus {
    pub(crate) fn new() -> Self {
        let (signals, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(FakeState::default()),
            signals,
        }
    }

    pub(crate) fn with_property(
        self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
        value: PropertyValue,
    ) -> Self {
        self.put(service, path, interface, property, value);
        self
    }

    pub(crate) fn put(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
        value: PropertyValue,
    ) {
        let mut state = self.state.lock().unwrap();
        state.values.insert(
            (path.to_string(), interface.to_string(), property.to_string()),
            value,
        );
        let interfaces = state
            .tree
            .entry(path.to_string())
            .or_default()
            .entry(service.to_string())
            .or_default();
        if !interfaces.iter().any(|i| i == interface) {
            interfaces.push(interface.to_string());
        }
        state.owners.entry(service.to_string()).or_insert(true);
    }

    pub(crate) fn set_owner(&self, service: &str, has_owner: bool) {
        self.state
            .lock()
            .unwrap()
            .owners
            .insert(service.to_string(), has_owner);
    }

    pub(crate) fn matches(&self) -> Vec<String> {
        self.state.lock().unwrap().matches.clone()
    }

    pub(crate) fn units(&self) -> Vec<String> {
        self.state.lock().unwrap().units.clone()
    }

    pub(crate) fn sub_tree_calls(&self) -> usize {
        self.state.lock().unwrap().sub_tree_calls
    }

    pub(crate) fn target_writes(&self) -> Vec<(String, u64)> {
        self.state
            .lock()
            .unwrap()
            .writes
            .iter()
            .filter(|((_, _, property), _)| property == "Target")
            .filter_map(|((path, _, _), value)| {
                let speed = value.get::<i64>("", "")?;
                Some((path.clone(), u64::try_from(speed).ok()?))
            })
            .collect()
    }

    pub(crate) fn published(&self, path: &str, interface: &str, property: &str) -> Option<PropertyValue> {
        self.state
            .lock()
            .unwrap()
            .published
            .get(&(path.to_string(), interface.to_string()))?
            .get(property)
            .cloned()
    }

    pub(crate) fn emit(&self, signal: BusSignal) {
        let _ = self.signals.send(signal);
    }
}

impl PropertyBus for FakeBus {
    fn get_service(&self, path: &str, interface: &str) -> Result<String, BusError> {
        let state = self.state.lock().unwrap();
        state
            .tree
            .get(path)
            .and_then(|services| {
                services
                    .iter()
                    .find(|(_, interfaces)| interfaces.iter().any(|i| i == interface))
            })
            .map(|(service, _)| service.clone())
            .ok_or_else(|| BusError::ServiceNotFound {
                path: path.to_string(),
                interface: interface.to_string(),
            })
    }

    fn get_property(
        &self,
        _service: &str,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<PropertyValue, BusError> {
        let state = self.state.lock().unwrap();
        state
            .values
            .get(&(path.to_string(), interface.to_string(), property.to_string()))
            .cloned()
            .ok_or_else(|| BusError::NoSuchProperty {
                path: path.to_string(),
                interface: interface.to_string(),
                property: property.to_string(),
            })
    }

    fn set_property(
        &self,
        _service: &str,
        path: &str,
        interface: &str,
        property: &str,
        value: PropertyValue,
    ) -> Result<(), BusError> {
        let mut state = self.state.lock().unwrap();
        let key = (path.to_string(), interface.to_string(), property.to_string());
        state.values.insert(key.clone(), value.clone());
        state.writes.push((key, value));
        Ok(())
    }

    fn get_sub_tree(&self, _path: &str, interface: &str, _depth: i32) -> Result<SubTree, BusError> {
        let mut state = self.state.lock().unwrap();
        state.sub_tree_calls += 1;
        let mut tree = SubTree::new();
        for (path, services) in &state.tree {
            for (service, interfaces) in services {
                if interfaces.iter().any(|i| i == interface) {
                    tree.entry(path.clone())
                        .or_default()
                        .insert(service.clone(), interfaces.clone());
                }
            }
        }
        Ok(tree)
    }

    fn name_has_owner(&self, name: &str) -> Result<bool, BusError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .owners
            .get(name)
            .copied()
            .unwrap_or(false))
    }

    fn add_match(&self, rule: &str) -> Result<(), BusError> {
        self.state.lock().unwrap().matches.push(rule.to_string());
        Ok(())
    }

    fn remove_match(&self, rule: &str) -> Result<(), BusError> {
        let mut state = self.state.lock().unwrap();
        if let Some(index) = state.matches.iter().position(|m| m == rule) {
            state.matches.remove(index);
        }
        Ok(())
    }

    fn start_unit(&self, unit: &str) -> Result<(), BusError> {
        self.state.lock().unwrap().units.push(unit.to_string());
        Ok(())
    }

    fn publish(&self, path: &str, interface: &str, properties: PropertyMap) -> Result<(), BusError> {
        self.state
            .lock()
            .unwrap()
            .published
            .entry((path.to_string(), interface.to_string()))
            .or_default()
            .extend(properties);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<BusSignal> {
        self.signals.subscribe()
    }
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    modes: Mutex<BTreeMap<usize, String>>,
    corrupt: Mutex<bool>,
}

impl MemoryStore {
    pub(crate) fn with_mode(zone: usize, mode: &str) -> Self {
        let store = Self::default();
        store.modes.lock().unwrap().insert(zone, mode.to_string());
        store
    }

    pub(crate) fn corrupt() -> Self {
        let store = Self::with_mode(0, "garbage");
        *store.corrupt.lock().unwrap() = true;
        store
    }

    pub(crate) fn get(&self, zone: usize) -> Option<String> {
        self.modes.lock().unwrap().get(&zone).cloned()
    }
}

impl ModeStore for MemoryStore {
    fn save(&self, zone: usize, mode: &str) -> Result<(), PersistError> {
        self.modes.lock().unwrap().insert(zone, mode.to_string());
        Ok(())
    }

    fn restore(&self, zone: usize) -> Result<Option<String>, PersistError> {
        if *self.corrupt.lock().unwrap() {
            return Err(PersistError::Malformed {
                path: format!("{zone}/CurrentMode"),
                reason: "not a JSON string".to_string(),
            });
        }
        Ok(self.get(zone))
    }

    fn discard(&self, zone: usize) -> Result<(), PersistError> {
        self.modes.lock().unwrap().remove(&zone);
        *self.corrupt.lock().unwrap() = false;
        Ok(())
    }
}
