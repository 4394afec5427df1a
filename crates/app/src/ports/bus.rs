//! Property bus port: the narrow bus surface the engine consumes.
//!
//! Every call is synchronous: the engine runs on a single cooperative loop
//! and a failed round trip degrades to "value unavailable" instead of
//! stalling it. Signals are delivered through a broadcast receiver that the
//! manager polls from its run loop.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::broadcast;

use fanzone_domain::error::BusError;
use fanzone_domain::property::PropertyValue;

/// Object path → service name → interfaces, as reported by the mapper.
pub type SubTree = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Property values keyed by property name.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// A signal delivered by the property bus.
#[derive(Debug, Clone, PartialEq)]
pub enum BusSignal {
    PropertiesChanged {
        path: String,
        interface: String,
        changed: PropertyMap,
    },
    InterfacesAdded {
        path: String,
        interfaces: BTreeMap<String, PropertyMap>,
    },
    InterfacesRemoved {
        path: String,
        interfaces: Vec<String>,
    },
    NameOwnerChanged {
        name: String,
        old_owner: String,
        new_owner: String,
    },
    /// A client wrote a property on an object this process publishes.
    ///
    /// The write is only a request: the value changes once the owner
    /// accepts it and publishes the result.
    SetPropertyRequested {
        path: String,
        interface: String,
        property: String,
        value: PropertyValue,
    },
}

/// Synchronous access to the platform property bus.
pub trait PropertyBus {
    /// Resolve the service providing `interface` on `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ServiceNotFound`] when nothing provides it.
    fn get_service(&self, path: &str, interface: &str) -> Result<String, BusError>;

    /// Read a property from a service.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] when the call fails or the property is missing.
    fn get_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<PropertyValue, BusError>;

    /// Write a property on a service.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] when the call fails.
    fn set_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
        value: PropertyValue,
    ) -> Result<(), BusError>;

    /// List every object below `path` providing `interface`.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] when the mapper call fails.
    fn get_sub_tree(&self, path: &str, interface: &str, depth: i32)
    -> Result<SubTree, BusError>;

    /// Whether a service name currently has an owner.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] when the call fails.
    fn name_has_owner(&self, name: &str) -> Result<bool, BusError>;

    /// Subscribe to signals matching a match rule string.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] when the rule is rejected.
    fn add_match(&self, rule: &str) -> Result<(), BusError>;

    /// Drop a subscription previously added with [`PropertyBus::add_match`].
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] when the call fails.
    fn remove_match(&self, rule: &str) -> Result<(), BusError>;

    /// Ask the service manager to start a unit.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] when the call fails.
    fn start_unit(&self, unit: &str) -> Result<(), BusError>;

    /// Serve `interface` on `path` from this process, merging `properties`
    /// into the values already served there.
    ///
    /// Client writes to a published object arrive as
    /// [`BusSignal::SetPropertyRequested`].
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] when the object cannot be published.
    fn publish(&self, path: &str, interface: &str, properties: PropertyMap) -> Result<(), BusError>;

    /// Receive every signal delivered after this call.
    fn subscribe(&self) -> broadcast::Receiver<BusSignal>;
}

impl<T: PropertyBus + ?Sized> PropertyBus for Arc<T> {
    fn get_service(&self, path: &str, interface: &str) -> Result<String, BusError> {
        (**self).get_service(path, interface)
    }

    fn get_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<PropertyValue, BusError> {
        (**self).get_property(service, path, interface, property)
    }

    fn set_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
        value: PropertyValue,
    ) -> Result<(), BusError> {
        (**self).set_property(service, path, interface, property, value)
    }

    fn get_sub_tree(
        &self,
        path: &str,
        interface: &str,
        depth: i32,
    ) -> Result<SubTree, BusError> {
        (**self).get_sub_tree(path, interface, depth)
    }

    fn name_has_owner(&self, name: &str) -> Result<bool, BusError> {
        (**self).name_has_owner(name)
    }

    fn add_match(&self, rule: &str) -> Result<(), BusError> {
        (**self).add_match(rule)
    }

    fn remove_match(&self, rule: &str) -> Result<(), BusError> {
        (**self).remove_match(rule)
    }

    fn start_unit(&self, unit: &str) -> Result<(), BusError> {
        (**self).start_unit(unit)
    }

    fn publish(&self, path: &str, interface: &str, properties: PropertyMap) -> Result<(), BusError> {
        (**self).publish(path, interface, properties)
    }

    fn subscribe(&self) -> broadcast::Receiver<BusSignal> {
        (**self).subscribe()
    }
}

/// Resolve the owning service and read a property in one step.
///
/// # Errors
///
/// Returns the first [`BusError`] hit while resolving or reading.
pub fn lookup_property<B: PropertyBus + ?Sized>(
    bus: &B,
    path: &str,
    interface: &str,
    property: &str,
) -> Result<PropertyValue, BusError> {
    let service = bus.get_service(path, interface)?;
    bus.get_property(&service, path, interface, property)
}

/// Resolve the owning service and write a property in one step.
///
/// # Errors
///
/// Returns the first [`BusError`] hit while resolving or writing.
pub fn lookup_and_set_property<B: PropertyBus + ?Sized>(
    bus: &B,
    path: &str,
    interface: &str,
    property: &str,
    value: PropertyValue,
) -> Result<(), BusError> {
    let service = bus.get_service(path, interface)?;
    bus.set_property(&service, path, interface, property, value)
}
