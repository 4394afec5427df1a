//! Simulated machine: objects published on the virtual bus at startup.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use fanzone_adapter_virtual_bus::VirtualBus;
use fanzone_app::ports::PropertyMap;

#[derive(Debug, Deserialize)]
struct Simulation {
    #[serde(default)]
    objects: Vec<SimulatedObject>,
}

#[derive(Debug, Deserialize)]
struct SimulatedObject {
    service: String,
    path: String,
    interface: String,
    #[serde(default)]
    properties: PropertyMap,
}

/// Publish every object described in `path` on `bus`.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed.
pub fn seed(bus: &VirtualBus, path: &Path) -> anyhow::Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read simulation file {}", path.display()))?;
    let simulation: Simulation = toml::from_str(&content)
        .with_context(|| format!("failed to parse simulation file {}", path.display()))?;
    for object in &simulation.objects {
        bus.add_interface(
            &object.service,
            &object.path,
            &object.interface,
            object.properties.clone(),
        );
    }
    Ok(simulation.objects.len())
}

#[cfg(test)]
mod tests {
    use fanzone_app::ports::PropertyBus;
    use fanzone_domain::property::PropertyValue;

    use super::*;

    #[test]
    fn should_publish_demo_objects() {
        let bus = VirtualBus::new();
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../demos/simulation.toml");
        assert_eq!(seed(&bus, &path).unwrap(), 6);
        assert_eq!(
            bus.get_service("/xyz/openbmc_project/sensors/fan_tach/fan0_0", "xyz.openbmc_project.Control.FanSpeed")
                .unwrap(),
            "xyz.openbmc_project.Hwmon.fans"
        );
        assert_eq!(
            bus.property(
                "/xyz/openbmc_project/sensors/temperature/ambient",
                "xyz.openbmc_project.Sensor.Value",
                "Value"
            ),
            Some(PropertyValue::Double(22.5))
        );
    }

    #[test]
    fn should_fail_when_simulation_file_missing() {
        let bus = VirtualBus::new();
        assert!(seed(&bus, Path::new("missing-simulation.toml")).is_err());
    }
}
