//! Zone: the hysteresis state machine behind one target fan speed.
//!
//! ## Responsibilities
//! - Own the zone's fans, property cache and active rule bindings
//! - Turn action requests into a rate-limited target speed:
//!   increases apply immediately (bounded by the ceiling) and settle for a
//!   configured delay, decreases are deferred to a repeating timer (bounded
//!   by the floor)
//! - Gate speed, floor and decrease changes on per-group votes
//!
//! All state is touched from the manager's single control loop only.

mod events;
mod properties;
mod services;

pub use services::Service;

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tokio::time::Instant;

use fanzone_domain::group::Group;
use fanzone_domain::thermal::ThermalMode;
use fanzone_domain::zone::{ControlMode, ZoneDefinition};

use crate::cache::PropertyCache;
use crate::fan::Fan;
use crate::ports::{ModeStore, PropertyBus, SubTree};
use crate::timer::Timer;

use events::{SignalEvent, TimerEvent};

/// Object path zones are exposed under, suffixed by the zone number.
pub const CONTROL_OBJECT_ROOT: &str = "/xyz/openbmc_project/control/thermal";

pub struct Zone<B, S> {
    number: usize,
    path: String,
    bus: B,
    store: S,
    full_speed: u64,
    default_floor: u64,
    default_ceiling: u64,
    floor: u64,
    ceiling: u64,
    target: u64,
    inc_delta: u64,
    dec_delta: u64,
    request_base: u64,
    ceiling_key_value: i64,
    is_active: bool,
    increase_delay: Duration,
    decrease_interval: Duration,
    inc_timer: Timer,
    dec_timer: Timer,
    fans: Vec<Fan>,
    cache: PropertyCache,
    active_allow: BTreeMap<Group, bool>,
    floor_change_allow: BTreeMap<Group, bool>,
    decrease_allow: BTreeMap<Group, bool>,
    services: BTreeMap<Group, Vec<Service>>,
    service_tree: SubTree,
    thermal_mode: ThermalMode,
    persisted: BTreeSet<&'static str>,
    timer_events: BTreeMap<String, Vec<TimerEvent>>,
    signal_events: BTreeMap<String, Vec<SignalEvent>>,
}

impl<B: PropertyBus, S: ModeStore> Zone<B, S> {
    /// Build a zone from its definition.
    ///
    /// In [`ControlMode::Control`] the thermal mode handlers are applied,
    /// the persisted mode is restored and published, the target is taken over from the
    /// first fan, every rule is initialized and the decrease timer starts.
    /// Init triggers therefore run before the zone ever sees a signal.
    #[tracing::instrument(skip_all, fields(zone = def.number, %mode))]
    pub fn new(bus: B, store: S, def: &ZoneDefinition, mode: ControlMode) -> Self {
        let fans = def.fans.iter().map(|fan| Fan::new(&bus, fan)).collect();
        let mut zone = Self {
            number: def.number,
            path: format!("{CONTROL_OBJECT_ROOT}/{}", def.number),
            bus,
            store,
            full_speed: def.full_speed,
            default_floor: def.default_floor,
            default_ceiling: def.full_speed,
            floor: def.default_floor,
            ceiling: def.full_speed,
            target: def.full_speed,
            inc_delta: 0,
            dec_delta: 0,
            request_base: 0,
            ceiling_key_value: 0,
            is_active: true,
            increase_delay: def.increase_delay,
            decrease_interval: def.decrease_interval,
            inc_timer: Timer::new(),
            dec_timer: Timer::new(),
            fans,
            cache: PropertyCache::new(),
            active_allow: BTreeMap::new(),
            floor_change_allow: BTreeMap::new(),
            decrease_allow: BTreeMap::new(),
            services: BTreeMap::new(),
            service_tree: SubTree::new(),
            thermal_mode: ThermalMode::default(),
            persisted: BTreeSet::new(),
            timer_events: BTreeMap::new(),
            signal_events: BTreeMap::new(),
        };

        if mode == ControlMode::Control {
            zone.apply_handlers(&def.handlers);
            zone.restore_current_mode();
            zone.publish_thermal_mode();
            if let Some(fan) = zone.fans.first() {
                zone.target = fan.target();
            }
            for event in &def.events {
                zone.init_event(event);
            }
            zone.dec_timer.restart(zone.decrease_interval);
        }
        tracing::debug!(target = zone.target, fans = zone.fans.len(), "zone ready");
        zone
    }

    /// Commit `speed` to every fan while the zone is active.
    pub fn set_speed(&mut self, speed: u64) {
        if !self.is_active {
            return;
        }
        self.write_target(speed);
    }

    /// Drive every fan to full speed regardless of the active votes.
    pub fn set_full_speed(&mut self) {
        if self.full_speed != 0 {
            self.write_target(self.full_speed);
        }
    }

    fn write_target(&mut self, speed: u64) {
        if speed != self.target {
            tracing::debug!(zone = self.number, from = self.target, to = speed, "target speed changed");
        }
        self.target = speed;
        for fan in &mut self.fans {
            fan.set_speed(&self.bus, speed);
        }
    }

    /// Record a group's vote on whether the zone may actively set speeds.
    ///
    /// A disallowing vote deactivates the zone at once; an allowing vote
    /// reactivates it only when every recorded vote allows.
    pub fn set_active_allow(&mut self, group: &Group, allow: bool) {
        self.active_allow.insert(group.clone(), allow);
        self.is_active = allow && self.active_allow.values().all(|v| *v);
    }

    pub fn set_floor_change_allow(&mut self, group: &Group, allow: bool) {
        self.floor_change_allow.insert(group.clone(), allow);
    }

    pub fn set_decrease_allow(&mut self, group: &Group, allow: bool) {
        self.decrease_allow.insert(group.clone(), allow);
    }

    /// Set the floor when every floor-change vote allows it, raising the
    /// target up to a floor above it.
    pub fn set_floor(&mut self, speed: u64) {
        if !self.floor_change_allow.values().all(|v| *v) {
            return;
        }
        self.floor = speed;
        if self.target < self.floor {
            self.request_speed_increase(self.floor - self.target);
        }
    }

    pub fn set_ceiling(&mut self, speed: u64) {
        self.ceiling = speed;
    }

    pub fn set_default_floor(&mut self, speed: u64) {
        self.default_floor = speed;
    }

    /// Base for speed requests; zero means "use the current target".
    pub fn set_request_speed_base(&mut self, base: u64) {
        self.request_base = base;
    }

    /// Store a new ceiling key value, returning the previous one.
    pub fn swap_ceiling_key_value(&mut self, value: i64) -> i64 {
        std::mem::replace(&mut self.ceiling_key_value, value)
    }

    /// Request a speed increase of `delta` above the request base.
    ///
    /// Ignored unless `delta` exceeds the increase already in flight and the
    /// target is below the ceiling. Restarts the increase settle timer.
    pub fn request_speed_increase(&mut self, delta: u64) {
        if delta <= self.inc_delta || self.target >= self.ceiling {
            return;
        }
        let requested = self
            .request_speed_base()
            .saturating_add(delta - self.inc_delta)
            .min(self.ceiling);
        self.inc_delta = delta;
        self.set_speed(requested);
        self.inc_timer.restart_once(self.increase_delay);
    }

    /// Remember the smallest decrease requested since the last decrease tick.
    pub fn request_speed_decrease(&mut self, delta: u64) {
        if self.dec_delta == 0 || delta < self.dec_delta {
            self.dec_delta = delta;
        }
    }

    fn increase_timer_expired(&mut self) {
        self.inc_delta = 0;
    }

    fn decrease_timer_expired(&mut self) {
        let allowed = self.decrease_allow.values().all(|v| *v);
        if allowed && self.dec_delta != 0 && self.inc_delta == 0 && !self.inc_timer.is_enabled() {
            let base = self.request_speed_base().min(self.ceiling);
            let requested = match base.checked_sub(self.dec_delta) {
                Some(lowered) if lowered >= self.floor => lowered,
                _ => self.floor,
            };
            self.set_speed(requested);
        }
        self.dec_delta = 0;
    }

    /// Run everything due at `now`: the increase settle timer, the decrease
    /// timer and any rule timers.
    pub fn process_timers(&mut self, now: Instant) {
        if self.inc_timer.expire(now) {
            self.increase_timer_expired();
        }
        if self.dec_timer.expire(now) {
            self.decrease_timer_expired();
        }
        self.expire_timer_events(now);
    }

    /// Earliest instant any timer of this zone is due.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        let rule_timers = self
            .timer_events
            .values()
            .flatten()
            .filter_map(TimerEvent::deadline);
        self.inc_timer
            .deadline()
            .into_iter()
            .chain(self.dec_timer.deadline())
            .chain(rule_timers)
            .min()
    }
}

impl<B, S> Zone<B, S> {
    #[must_use]
    pub fn number(&self) -> usize {
        self.number
    }

    /// Object path the zone's control properties live under.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn target(&self) -> u64 {
        self.target
    }

    #[must_use]
    pub fn floor(&self) -> u64 {
        self.floor
    }

    #[must_use]
    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    #[must_use]
    pub fn default_floor(&self) -> u64 {
        self.default_floor
    }

    #[must_use]
    pub fn default_ceiling(&self) -> u64 {
        self.default_ceiling
    }

    #[must_use]
    pub fn full_speed(&self) -> u64 {
        self.full_speed
    }

    #[must_use]
    pub fn inc_delta(&self) -> u64 {
        self.inc_delta
    }

    #[must_use]
    pub fn dec_delta(&self) -> u64 {
        self.dec_delta
    }

    #[must_use]
    pub fn ceiling_key_value(&self) -> i64 {
        self.ceiling_key_value
    }

    /// The configured request base, or the current target when unset.
    #[must_use]
    pub fn request_speed_base(&self) -> u64 {
        if self.request_base == 0 {
            self.target
        } else {
            self.request_base
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub fn is_increasing(&self) -> bool {
        self.inc_timer.is_enabled()
    }

    #[must_use]
    pub fn fans(&self) -> &[Fan] {
        &self.fans
    }

    #[must_use]
    pub fn active_allow(&self, group: &Group) -> Option<bool> {
        self.active_allow.get(group).copied()
    }

    #[must_use]
    pub fn floor_change_allow(&self, group: &Group) -> Option<bool> {
        self.floor_change_allow.get(group).copied()
    }

    #[must_use]
    pub fn decrease_allow(&self, group: &Group) -> Option<bool> {
        self.decrease_allow.get(group).copied()
    }
}
