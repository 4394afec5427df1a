//! A fan: the rotor sensor objects a zone writes its target speed to.

use fanzone_domain::property::PropertyValue;
use fanzone_domain::zone::FanDefinition;

use crate::ports::PropertyBus;
use crate::ports::bus::{lookup_and_set_property, lookup_property};

/// Property holding a rotor's requested speed.
pub const TARGET_PROPERTY: &str = "Target";

#[derive(Debug, Clone)]
pub struct Fan {
    name: String,
    sensors: Vec<String>,
    interface: String,
    target: u64,
}

impl Fan {
    /// Build a fan, adopting the target currently set on its first sensor.
    ///
    /// An unreadable sensor leaves the target at zero.
    pub fn new<B: PropertyBus + ?Sized>(bus: &B, def: &FanDefinition) -> Self {
        let target = def
            .sensors
            .first()
            .and_then(|sensor| {
                lookup_property(bus, sensor, &def.target_interface, TARGET_PROPERTY)
                    .map_err(|err| {
                        tracing::warn!(fan = %def.name, %sensor, %err, "unable to read fan target");
                    })
                    .ok()
            })
            .and_then(|value| value.get::<i64>(&def.target_interface, TARGET_PROPERTY))
            .and_then(|target| u64::try_from(target).ok())
            .unwrap_or(0);
        Self {
            name: def.name.clone(),
            sensors: def.sensors.clone(),
            interface: def.target_interface.clone(),
            target,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn target(&self) -> u64 {
        self.target
    }

    /// Write `speed` as the target of every rotor sensor.
    ///
    /// Sensors that reject the write are logged and skipped.
    pub fn set_speed<B: PropertyBus + ?Sized>(&mut self, bus: &B, speed: u64) {
        let value = PropertyValue::Int64(i64::try_from(speed).unwrap_or(i64::MAX));
        for sensor in &self.sensors {
            if let Err(err) =
                lookup_and_set_property(bus, sensor, &self.interface, TARGET_PROPERTY, value.clone())
            {
                tracing::warn!(fan = %self.name, %sensor, %err, "failed to write fan target");
            }
        }
        self.target = speed;
    }
}
