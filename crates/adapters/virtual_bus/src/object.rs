//! A published object: one owning service and its interfaces.

use std::collections::BTreeMap;

use fanzone_app::ports::PropertyMap;
use fanzone_domain::property::PropertyValue;

pub(crate) struct Object {
    service: String,
    interfaces: BTreeMap<String, PropertyMap>,
}

impl Object {
    pub(crate) fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
            interfaces: BTreeMap::new(),
        }
    }

    pub(crate) fn service(&self) -> &str {
        &self.service
    }

    /// Merge `properties` into `interface`; the last publisher serves the object.
    pub(crate) fn insert_interface(&mut self, service: &str, interface: &str, properties: PropertyMap) {
        service.clone_into(&mut self.service);
        self.interfaces
            .entry(interface.to_string())
            .or_default()
            .extend(properties);
    }

    pub(crate) fn remove_interface(&mut self, interface: &str) -> bool {
        self.interfaces.remove(interface).is_some()
    }

    pub(crate) fn has_interface(&self, interface: &str) -> bool {
        self.interfaces.contains_key(interface)
    }

    pub(crate) fn interfaces(&self) -> Vec<String> {
        self.interfaces.keys().cloned().collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    pub(crate) fn value(&self, interface: &str, property: &str) -> Option<&PropertyValue> {
        self.interfaces.get(interface)?.get(property)
    }

    /// Store a value, `Some(changed)` when the interface exists.
    pub(crate) fn store(&mut self, interface: &str, property: &str, value: PropertyValue) -> Option<bool> {
        let properties = self.interfaces.get_mut(interface)?;
        let changed = properties.get(property) != Some(&value);
        properties.insert(property.to_string(), value);
        Some(changed)
    }
}
