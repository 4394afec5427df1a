//! Property access through the zone's cache, and the zone's own thermal
//! mode properties.

use fanzone_domain::error::FanControlError;
use fanzone_domain::group::{Group, Member};
use fanzone_domain::property::{FromPropertyValue, PropertyValue};
use fanzone_domain::thermal::{CURRENT_PROPERTY, SUPPORTED_PROPERTY, THERMAL_MODE_INTERFACE};
use fanzone_domain::zone::ZoneHandler;

use super::Zone;
use crate::ports::{ModeStore, PropertyBus, PropertyMap};

impl<B: PropertyBus, S: ModeStore> Zone<B, S> {
    /// Read `member` as `T`.
    ///
    /// A cached, type-compatible value is returned directly; otherwise the
    /// bus is queried and the answer cached.
    ///
    /// # Errors
    ///
    /// Returns [`FanControlError::PropertyUnavailable`] when the value
    /// cannot be obtained or is not readable as `T`.
    pub fn get_value<T: FromPropertyValue>(&mut self, member: &Member) -> Result<T, FanControlError> {
        let cached = self
            .cache
            .get(&member.path, &member.interface, &member.property)
            .and_then(|value| value.get::<T>(&member.interface, &member.property));
        if let Some(value) = cached {
            return Ok(value);
        }
        self.refresh_property(member)?
            .get::<T>(&member.interface, &member.property)
            .ok_or_else(|| FanControlError::unavailable(member))
    }

    /// The raw value of `member`, from the cache or else from the bus.
    ///
    /// # Errors
    ///
    /// Returns [`FanControlError::PropertyUnavailable`] when the value
    /// cannot be obtained.
    pub fn property(&mut self, member: &Member) -> Result<PropertyValue, FanControlError> {
        match self.cache.get(&member.path, &member.interface, &member.property) {
            Some(value) => Ok(value.clone()),
            None => self.refresh_property(member),
        }
    }

    /// Query `member` from its owning service and cache the answer.
    ///
    /// # Errors
    ///
    /// Returns [`FanControlError::PropertyUnavailable`] when the service
    /// cannot be resolved or the read fails.
    pub fn refresh_property(&mut self, member: &Member) -> Result<PropertyValue, FanControlError> {
        let service = self.get_service(&member.path, &member.interface).map_err(|err| {
            tracing::debug!(zone = self.number, %member, %err, "no service for property");
            FanControlError::unavailable(member)
        })?;
        match self
            .bus
            .get_property(&service, &member.path, &member.interface, &member.property)
        {
            Ok(value) => {
                self.cache
                    .set(&member.path, &member.interface, &member.property, value.clone());
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(zone = self.number, %member, %err, "property unavailable");
                Err(FanControlError::unavailable(member))
            }
        }
    }

    pub(super) fn refresh_properties(&mut self, group: &Group) {
        for member in group {
            // unreadable members only get a value once a signal carries one
            let _ = self.refresh_property(member);
        }
    }

    /// Select the zone's thermal mode.
    ///
    /// The mode must be one of the supported modes, compared
    /// case-insensitively; it is stored upper-cased. A change is persisted
    /// when the property is marked persistent, published on the bus and
    /// re-runs the rules bound to it. Returns the resulting current mode.
    pub fn set_current_mode(&mut self, mode: &str) -> &str {
        let requested = mode.to_uppercase();
        if requested != self.thermal_mode.current() && self.thermal_mode.select(&requested).is_some() {
            tracing::info!(zone = self.number, mode = %requested, "thermal mode changed");
            if self.persisted.contains(CURRENT_PROPERTY) {
                if let Err(err) = self.store.save(self.number, &requested) {
                    tracing::error!(zone = self.number, %err, "failed to persist thermal mode");
                }
            }
            let member = self.current_mode_member();
            self.cache.set(
                &member.path,
                &member.interface,
                &member.property,
                PropertyValue::String(requested),
            );
            self.publish_thermal_mode();
            self.run_own_property_events(&member);
        }
        self.thermal_mode.current()
    }

    /// Serve the zone's `Current` and `Supported` modes at its object path.
    pub(super) fn publish_thermal_mode(&self) {
        let properties = PropertyMap::from([
            (
                CURRENT_PROPERTY.to_string(),
                PropertyValue::from(self.thermal_mode.current()),
            ),
            (
                SUPPORTED_PROPERTY.to_string(),
                PropertyValue::from(self.thermal_mode.supported().to_vec()),
            ),
        ]);
        if let Err(err) = self.bus.publish(&self.path, THERMAL_MODE_INTERFACE, properties) {
            tracing::error!(zone = self.number, %err, "failed to publish thermal mode");
        }
    }

    pub(super) fn apply_handlers(&mut self, handlers: &[ZoneHandler]) {
        for handler in handlers {
            match handler {
                ZoneHandler::SupportedModes { modes, persist } => {
                    self.thermal_mode.set_supported(modes.clone());
                    if *persist {
                        self.persisted.insert(SUPPORTED_PROPERTY);
                    }
                }
                ZoneHandler::CurrentMode { mode, persist } => {
                    self.thermal_mode.force_current(mode);
                    let member = self.current_mode_member();
                    let current = PropertyValue::from(self.thermal_mode.current());
                    self.cache
                        .set(&member.path, &member.interface, &member.property, current);
                    if *persist {
                        self.persisted.insert(CURRENT_PROPERTY);
                    }
                }
            }
        }
    }

    /// Restore the persisted mode; an unreadable record is discarded and the
    /// configured mode kept.
    pub(super) fn restore_current_mode(&mut self) {
        let restored = match self.store.restore(self.number) {
            Ok(mode) => mode,
            Err(err) => {
                tracing::error!(zone = self.number, %err, "failed to restore thermal mode, keeping the configured one");
                if let Err(err) = self.store.discard(self.number) {
                    tracing::error!(zone = self.number, %err, "failed to discard persisted thermal mode");
                }
                None
            }
        };
        if let Some(mode) = restored {
            self.set_current_mode(&mode);
        }
    }
}

impl<B, S> Zone<B, S> {
    /// Cache `value` for a property, as signal delivery does.
    pub fn set_value(&mut self, path: &str, interface: &str, property: &str, value: PropertyValue) {
        self.cache.set(path, interface, property, value);
    }

    #[must_use]
    pub fn cached_value(&self, member: &Member) -> Option<&PropertyValue> {
        self.cache.get(&member.path, &member.interface, &member.property)
    }

    pub fn remove_interface(&mut self, path: &str, interface: &str) {
        self.cache.remove_interface(path, interface);
    }

    #[must_use]
    pub fn current_mode(&self) -> &str {
        self.thermal_mode.current()
    }

    #[must_use]
    pub fn supported_modes(&self) -> &[String] {
        self.thermal_mode.supported()
    }

    /// The zone's own `Current` thermal mode property.
    #[must_use]
    pub fn current_mode_member(&self) -> Member {
        Member::new(self.path.clone(), THERMAL_MODE_INTERFACE, CURRENT_PROPERTY)
    }
}
