//! Manager: zone construction and the single control loop.
//!
//! ## Responsibilities
//! - Select the zone group whose conditions match the running platform
//! - Build one [`Zone`] per zone definition of that group
//! - In init mode: full speed, settle, signal readiness
//! - In control mode: multiplex bus signals, control requests and timer
//!   deadlines onto the zones, one at a time, until shutdown

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use fanzone_domain::error::{BusError, ConfigError, FanControlError};
use fanzone_domain::layout::{Condition, Layout};
use fanzone_domain::property::PropertyValue;
use fanzone_domain::thermal::{CURRENT_PROPERTY, THERMAL_MODE_INTERFACE};
use fanzone_domain::zone::ControlMode;

use crate::ports::bus::lookup_property;
use crate::ports::{BusSignal, ModeStore, PropertyBus};
use crate::zone::Zone;

/// Unit started once init mode has settled the fans.
pub const FAN_CONTROL_READY_TARGET: &str = "obmc-fan-control-ready@0.target";

/// Requests accepted by the control loop from outside the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    /// Select a zone's thermal mode.
    SetCurrentMode { zone: usize, mode: String },
}

pub struct Manager<B, S> {
    bus: B,
    signals: broadcast::Receiver<BusSignal>,
    power_on_delay: Duration,
    zones: BTreeMap<usize, Zone<B, S>>,
}

impl<B, S> Manager<B, S>
where
    B: PropertyBus + Clone,
    S: ModeStore + Clone,
{
    /// Select the matching zone group of `layout` and build its zones.
    ///
    /// The signal subscription is taken before any zone exists, so nothing
    /// delivered after rule initialization is missed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ConfigurationMismatch`] when no zone group's
    /// conditions match.
    #[tracing::instrument(skip_all, fields(%mode))]
    pub fn new(bus: B, store: S, layout: &Layout, mode: ControlMode) -> Result<Self, FanControlError> {
        let signals = bus.subscribe();
        let group = layout
            .zone_groups
            .iter()
            .find(|group| group.conditions.iter().all(|c| condition_matches(&bus, c)))
            .ok_or(ConfigError::ConfigurationMismatch)?;

        let zones: BTreeMap<usize, Zone<B, S>> = group
            .zones
            .iter()
            .map(|def| (def.number, Zone::new(bus.clone(), store.clone(), def, mode)))
            .collect();
        tracing::info!(zones = zones.len(), "zones constructed");

        Ok(Self {
            bus,
            signals,
            power_on_delay: layout.power_on_delay,
            zones,
        })
    }

    /// Init mode: drive every zone to full speed, wait for the power-on
    /// delay, then start the readiness target.
    ///
    /// # Errors
    ///
    /// Returns a bus error when the readiness target cannot be started.
    pub async fn do_init(&mut self) -> Result<(), FanControlError> {
        for zone in self.zones.values_mut() {
            zone.set_full_speed();
        }
        tracing::info!(delay = ?self.power_on_delay, "fans at full speed, waiting to settle");
        tokio::time::sleep(self.power_on_delay).await;
        self.bus.start_unit(FAN_CONTROL_READY_TARGET)?;
        tracing::info!(unit = FAN_CONTROL_READY_TARGET, "fan control ready");
        Ok(())
    }

    /// Control mode loop.
    ///
    /// Each iteration handles exactly one of: a bus signal, a control
    /// request, or the earliest due timer. Every callback runs to completion
    /// before the next is taken. Returns once `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Disconnected`] when the signal stream closes.
    pub async fn run<F>(
        &mut self,
        requests: &mut mpsc::Receiver<ControlRequest>,
        shutdown: F,
    ) -> Result<(), FanControlError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut accepting = true;
        tracing::info!("control loop started");
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("control loop stopping");
                    return Ok(());
                }
                received = self.signals.recv() => match received {
                    Ok(signal) => self.dispatch_signal(&signal),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "signal receiver lagged, signals dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(BusError::Disconnected.into());
                    }
                },
                request = requests.recv(), if accepting => match request {
                    Some(request) => self.handle_request(request),
                    None => accepting = false,
                },
                () = sleep_until(deadline) => self.process_timers(Instant::now()),
            }
        }
    }

    /// Deliver a signal to every zone.
    ///
    /// Writes to a zone's published `Current` thermal mode are turned into
    /// [`ControlRequest::SetCurrentMode`] instead.
    pub fn dispatch_signal(&mut self, signal: &BusSignal) {
        if let BusSignal::SetPropertyRequested {
            path,
            interface,
            property,
            value,
        } = signal
        {
            match self.mode_request(path, interface, property, value) {
                Some(request) => self.handle_request(request),
                None => tracing::debug!(%path, %interface, %property, "ignored property write"),
            }
            return;
        }
        for zone in self.zones.values_mut() {
            zone.handle_signal(signal);
        }
    }

    fn mode_request(
        &self,
        path: &str,
        interface: &str,
        property: &str,
        value: &PropertyValue,
    ) -> Option<ControlRequest> {
        if interface != THERMAL_MODE_INTERFACE || property != CURRENT_PROPERTY {
            return None;
        }
        let zone = self.zones.values().find(|zone| zone.path() == path)?;
        let mode = value.get::<String>(interface, property)?;
        Some(ControlRequest::SetCurrentMode {
            zone: zone.number(),
            mode,
        })
    }

    /// Run every zone timer due at `now`.
    pub fn process_timers(&mut self, now: Instant) {
        for zone in self.zones.values_mut() {
            zone.process_timers(now);
        }
    }

    /// Earliest instant any zone timer is due.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.zones.values().filter_map(Zone::next_deadline).min()
    }

    fn handle_request(&mut self, request: ControlRequest) {
        match request {
            ControlRequest::SetCurrentMode { zone, mode } => {
                if let Err(err) = self.set_current_mode(zone, &mode) {
                    tracing::warn!(%err, "rejected thermal mode request");
                }
            }
        }
    }

    /// Select the thermal mode of zone `number`, returning the mode in
    /// effect afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownZone`] when no such zone exists.
    pub fn set_current_mode(&mut self, number: usize, mode: &str) -> Result<String, FanControlError> {
        let zone = self
            .zones
            .get_mut(&number)
            .ok_or(ConfigError::UnknownZone(number))?;
        Ok(zone.set_current_mode(mode).to_string())
    }
}

impl<B, S> Manager<B, S> {
    #[must_use]
    pub fn zone(&self, number: usize) -> Option<&Zone<B, S>> {
        self.zones.get(&number)
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone<B, S>> {
        self.zones.values()
    }
}

/// A condition matches when every property reads back equal to its value.
///
/// Any bus failure makes it not match.
fn condition_matches<B: PropertyBus + ?Sized>(bus: &B, condition: &Condition) -> bool {
    condition.properties.iter().all(|property| {
        let member = &property.member;
        match lookup_property(bus, &member.path, &member.interface, &member.property) {
            Ok(value) => property.value.matches(&value, &member.interface, &member.property),
            Err(err) => {
                tracing::warn!(%member, %err, "condition property unavailable");
                false
            }
        }
    })
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use fanzone_domain::group::{Group, Member};
    use fanzone_domain::layout::{ConditionProperty, ZoneGroup};
    use fanzone_domain::property::PropertyValue;
    use fanzone_domain::rule::{Action, SetSpeedEvent, SignalKind, Trigger};
    use fanzone_domain::zone::ZoneHandler;

    use super::*;
    use crate::test_support::{FakeBus, MemoryStore};
    use crate::zone::tests::{definition, fan_bus};

    const COOLING: &str = "xyz.openbmc_project.Inventory.Decorator.CoolingType";
    const SENSOR: &str = "xyz.openbmc_project.Sensor.Value";

    fn water_cooled(value: bool) -> Condition {
        Condition {
            properties: vec![ConditionProperty {
                member: Member::new("/inventory/chassis", COOLING, "WaterCooled"),
                value: PropertyValue::Bool(value),
            }],
        }
    }

    fn layout() -> Layout {
        let mut water = definition();
        water.full_speed = 6000;
        let mut air = definition();
        air.full_speed = 9000;
        Layout {
            power_on_delay: Duration::from_secs(20),
            zone_groups: vec![
                ZoneGroup {
                    conditions: vec![water_cooled(true)],
                    zones: vec![water],
                },
                ZoneGroup {
                    conditions: vec![water_cooled(false)],
                    zones: vec![air],
                },
            ],
        }
    }

    fn chassis_bus(water: bool) -> Arc<FakeBus> {
        let bus = fan_bus(3000);
        bus.put("inventory", "/inventory/chassis", COOLING, "WaterCooled", PropertyValue::Bool(water));
        bus
    }

    fn manager(bus: Arc<FakeBus>, layout: &Layout, mode: ControlMode) -> Manager<Arc<FakeBus>, Arc<MemoryStore>> {
        Manager::new(bus, Arc::new(MemoryStore::default()), layout, mode).unwrap()
    }

    #[test]
    fn should_select_first_matching_zone_group() {
        let manager = manager(chassis_bus(false), &layout(), ControlMode::Control);
        assert_eq!(manager.zone(0).unwrap().full_speed(), 9000);
    }

    #[test]
    fn should_fail_when_no_zone_group_matches() {
        let result = Manager::new(
            fan_bus(3000),
            Arc::new(MemoryStore::default()),
            &layout(),
            ControlMode::Control,
        );
        assert!(matches!(
            result,
            Err(FanControlError::Config(ConfigError::ConfigurationMismatch))
        ));
    }

    #[test]
    fn should_match_group_without_conditions() {
        let mut layout = layout();
        layout.zone_groups[0].conditions.clear();
        let manager = manager(fan_bus(3000), &layout, ControlMode::Control);
        assert_eq!(manager.zone(0).unwrap().full_speed(), 6000);
    }

    #[test]
    fn should_reject_mode_for_unknown_zone() {
        let mut manager = manager(chassis_bus(true), &layout(), ControlMode::Control);
        assert!(matches!(
            manager.set_current_mode(7, "Default"),
            Err(FanControlError::Config(ConfigError::UnknownZone(7)))
        ));
    }

    fn mode_write(path: &str, property: &str, value: PropertyValue) -> BusSignal {
        BusSignal::SetPropertyRequested {
            path: path.to_string(),
            interface: THERMAL_MODE_INTERFACE.to_string(),
            property: property.to_string(),
            value,
        }
    }

    #[test]
    fn should_select_mode_when_zone_current_mode_written() {
        let mut layout = layout();
        layout.zone_groups[0].zones[0].handlers = vec![ZoneHandler::SupportedModes {
            modes: vec!["Default".to_string(), "Quiet".to_string()],
            persist: false,
        }];
        let mut manager = manager(chassis_bus(true), &layout, ControlMode::Control);
        let path = manager.zone(0).unwrap().path().to_string();

        manager.dispatch_signal(&mode_write("/elsewhere/0", CURRENT_PROPERTY, PropertyValue::from("quiet")));
        manager.dispatch_signal(&mode_write(&path, "Supported", PropertyValue::from("quiet")));
        manager.dispatch_signal(&mode_write(&path, CURRENT_PROPERTY, PropertyValue::Int64(1)));
        assert_eq!(manager.zone(0).unwrap().current_mode(), "DEFAULT");

        manager.dispatch_signal(&mode_write(&path, CURRENT_PROPERTY, PropertyValue::from("quiet")));
        assert_eq!(manager.zone(0).unwrap().current_mode(), "QUIET");
    }

    #[tokio::test(start_paused = true)]
    async fn should_start_ready_target_after_power_on_delay() {
        let bus = chassis_bus(true);
        let mut manager = manager(Arc::clone(&bus), &layout(), ControlMode::Init);
        let started = Instant::now();
        manager.do_init().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(20));
        assert_eq!(manager.zone(0).unwrap().target(), 6000);
        assert_eq!(bus.units(), vec![FAN_CONTROL_READY_TARGET.to_string()]);
        assert_eq!(manager.next_deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn should_process_signals_requests_and_timers_until_shutdown() {
        let bus = chassis_bus(true);
        let sensors = Group::new(vec![Member::new("/temp/s1", SENSOR, "Value")]);
        bus.put("hwmon", "/temp/s1", SENSOR, "Value", PropertyValue::Int64(30_000));
        let mut def = definition();
        def.handlers = vec![
            ZoneHandler::SupportedModes {
                modes: vec!["Default".to_string(), "Quiet".to_string()],
                persist: false,
            },
            ZoneHandler::CurrentMode {
                mode: "Default".to_string(),
                persist: false,
            },
        ];
        def.events = vec![
            SetSpeedEvent::builder("floor")
                .group(sensors.clone())
                .actions(vec![Action::FloorFromAverageSensorValue {
                    table: [(40_000, 3000), (60_000, 6000)].into_iter().collect(),
                }])
                .trigger(Trigger::Init { method: None })
                .trigger(Trigger::Signal {
                    signal: SignalKind::PropertiesChanged,
                })
                .build(),
            SetSpeedEvent::builder("decrease")
                .group(sensors)
                .actions(vec![Action::NetDecreaseSpeed {
                    state: 70_000,
                    factor: std::num::NonZeroI64::new(10_000).unwrap(),
                    delta: 500,
                }])
                .trigger(Trigger::Signal {
                    signal: SignalKind::PropertiesChanged,
                })
                .build(),
        ];
        let layout = Layout {
            power_on_delay: Duration::ZERO,
            zone_groups: vec![ZoneGroup {
                conditions: Vec::new(),
                zones: vec![def],
            }],
        };
        let mut manager = manager(Arc::clone(&bus), &layout, ControlMode::Control);
        assert_eq!(manager.zone(0).unwrap().floor(), 3000);
        assert_eq!(manager.zone(0).unwrap().target(), 3000);

        let (tx, mut rx) = mpsc::channel(4);
        tx.send(ControlRequest::SetCurrentMode {
            zone: 0,
            mode: "quiet".to_string(),
        })
        .await
        .unwrap();
        bus.emit(BusSignal::PropertiesChanged {
            path: "/temp/s1".to_string(),
            interface: SENSOR.to_string(),
            changed: BTreeMap::from([("Value".to_string(), PropertyValue::Int64(50_000))]),
        });

        manager
            .run(&mut rx, tokio::time::sleep(Duration::from_secs(40)))
            .await
            .unwrap();

        let zone = manager.zone(0).unwrap();
        assert_eq!(zone.current_mode(), "QUIET");
        assert_eq!(zone.floor(), 6000);
        assert_eq!(zone.target(), 6000);
    }
}
