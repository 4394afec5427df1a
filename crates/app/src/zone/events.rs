//! Rule bindings: initializing and removing events, timer and signal
//! dispatch.
//!
//! Bindings are keyed by rule name only. Each holds its group and actions
//! behind an `Arc` so a binding can be run while the zone is mutably
//! borrowed, even if the run removes the binding itself.

use std::sync::Arc;

use tokio::time::Instant;

use fanzone_domain::group::{Group, Member};
use fanzone_domain::rule::{Action, InitMethod, SetSpeedEvent, SignalKind, TimerConf, TimerType, Trigger};
use fanzone_domain::thermal::THERMAL_MODE_INTERFACE;

use super::Zone;
use crate::actions;
use crate::handlers;
use crate::matches::MatchRule;
use crate::ports::{BusSignal, ModeStore, PropertyBus};
use crate::timer::Timer;

/// The group and actions a trigger runs.
#[derive(Debug)]
pub(crate) struct EventData {
    pub(crate) group: Group,
    pub(crate) actions: Vec<Action>,
}

#[derive(Debug)]
pub(crate) struct TimerEvent {
    data: Arc<EventData>,
    timer: Timer,
}

impl TimerEvent {
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }
}

/// A signal subscription for one group member.
///
/// Without a rule the member is one of the zone's own properties and the
/// binding runs when the zone writes that property.
#[derive(Debug)]
pub(crate) struct SignalEvent {
    data: Arc<EventData>,
    member: Member,
    rule: Option<MatchRule>,
}

impl<B: PropertyBus, S: ModeStore> Zone<B, S> {
    /// Bind every trigger of `event` to each of its (group, actions) pairs.
    ///
    /// Timer triggers arm a timer, signal triggers subscribe per member and
    /// init triggers run their actions right away. An event that already has
    /// bindings is left as it is.
    #[tracing::instrument(skip_all, fields(zone = self.number, event = %event.name))]
    pub fn init_event(&mut self, event: &SetSpeedEvent) {
        if self.has_event(&event.name) {
            tracing::trace!("event already active");
            return;
        }
        tracing::debug!("initializing event");
        for trigger in &event.triggers {
            for (group, actions) in event.bindings() {
                self.bind_trigger(&event.name, trigger, group, actions);
            }
        }
    }

    /// Tear down every timer and signal subscription of `event`.
    ///
    /// Idempotent: removing an inactive event does nothing.
    pub fn remove_event(&mut self, event: &SetSpeedEvent) {
        self.remove_event_named(&event.name);
    }

    pub(crate) fn remove_event_named(&mut self, name: &str) {
        let signals = self.signal_events.remove(name);
        let timers = self.timer_events.remove(name);
        if signals.is_none() && timers.is_none() {
            return;
        }
        for signal in signals.into_iter().flatten() {
            if let Some(rule) = signal.rule {
                if let Err(err) = self.bus.remove_match(&rule.to_string()) {
                    tracing::warn!(zone = self.number, event = %name, %err, "failed to remove signal match");
                }
            }
        }
        tracing::debug!(zone = self.number, event = %name, "event removed");
    }

    /// Whether any timer or signal binding exists under `name`.
    #[must_use]
    pub fn has_event(&self, name: &str) -> bool {
        self.signal_events.contains_key(name) || self.timer_events.contains_key(name)
    }

    /// Number of (timer, signal) bindings registered under `name`.
    #[must_use]
    pub fn binding_counts(&self, name: &str) -> (usize, usize) {
        (
            self.timer_events.get(name).map_or(0, Vec::len),
            self.signal_events.get(name).map_or(0, Vec::len),
        )
    }

    fn bind_trigger(&mut self, name: &str, trigger: &Trigger, group: &Group, actions: &[Action]) {
        match trigger {
            Trigger::Timer(conf) => self.add_timer(name, group.clone(), actions.to_vec(), *conf),
            Trigger::Signal { signal } => self.subscribe(name, *signal, group, actions),
            Trigger::Init { method } => {
                match method {
                    Some(InitMethod::GetProperties) => self.refresh_properties(group),
                    Some(InitMethod::NameHasOwner) => self.refresh_service_owners(group),
                    None => {}
                }
                self.run_actions(group, actions);
            }
        }
    }

    fn subscribe(&mut self, name: &str, kind: SignalKind, group: &Group, actions: &[Action]) {
        let data = Arc::new(EventData {
            group: group.clone(),
            actions: actions.to_vec(),
        });
        for member in group {
            let rule = if self.is_own_property(member) {
                None
            } else {
                let service = if kind == SignalKind::NameOwnerChanged {
                    self.get_service(&member.path, &member.interface)
                        .unwrap_or_default()
                } else {
                    String::new()
                };
                let rule = MatchRule::new(kind, member, &service);
                if let Err(err) = self.bus.add_match(&rule.to_string()) {
                    tracing::warn!(zone = self.number, %member, %err, "failed to add signal match");
                }
                Some(rule)
            };
            self.signal_events
                .entry(name.to_string())
                .or_default()
                .push(SignalEvent {
                    data: Arc::clone(&data),
                    member: member.clone(),
                    rule,
                });
        }
    }

    fn is_own_property(&self, member: &Member) -> bool {
        member.path == self.path && member.interface == THERMAL_MODE_INTERFACE
    }

    /// Arm a rule timer under `name`.
    pub(crate) fn add_timer(&mut self, name: &str, group: Group, actions: Vec<Action>, conf: TimerConf) {
        let mut timer = Timer::new();
        match conf.kind {
            TimerType::Repeating => timer.restart(conf.interval),
            TimerType::Oneshot => timer.restart_once(conf.interval),
        }
        self.timer_events
            .entry(name.to_string())
            .or_default()
            .push(TimerEvent {
                data: Arc::new(EventData { group, actions }),
                timer,
            });
    }

    /// Position of the timer under `name` running `actions` for `group`.
    pub(crate) fn find_timer(&self, name: &str, group: &Group, actions: &[Action]) -> Option<usize> {
        self.timer_events.get(name)?.iter().position(|event| {
            event.data.group == *group && event.data.actions.as_slice() == actions
        })
    }

    pub(crate) fn remove_timer(&mut self, name: &str, index: usize) {
        if let Some(timers) = self.timer_events.get_mut(name) {
            if index < timers.len() {
                timers.remove(index);
            }
            if timers.is_empty() {
                self.timer_events.remove(name);
            }
        }
    }

    /// Run every timer binding due at `now`.
    ///
    /// Timers removed by an earlier binding in the same pass are skipped.
    pub(super) fn expire_timer_events(&mut self, now: Instant) {
        let fired: Vec<Arc<EventData>> = self
            .timer_events
            .values_mut()
            .flatten()
            .filter_map(|event| event.timer.expire(now).then(|| Arc::clone(&event.data)))
            .collect();
        for data in fired {
            if !self.is_timer_bound(&data) {
                continue;
            }
            self.run_actions(&data.group, &data.actions);
        }
    }

    /// Deliver a bus signal to every subscription it matches.
    ///
    /// Each match runs its handler, caching the carried state, then its
    /// actions, in registration order. Subscriptions torn down by an earlier
    /// match in the same delivery are skipped.
    pub fn handle_signal(&mut self, signal: &BusSignal) {
        let matched: Vec<(Arc<EventData>, Member)> = self
            .signal_events
            .values()
            .flatten()
            .filter(|event| event.rule.as_ref().is_some_and(|rule| rule.matches(signal)))
            .map(|event| (Arc::clone(&event.data), event.member.clone()))
            .collect();
        for (data, member) in matched {
            if !self.is_bound(&data) {
                continue;
            }
            handlers::handle(self, &data.group, &member, signal);
            self.run_actions(&data.group, &data.actions);
        }
    }

    /// Run the bindings registered on one of the zone's own properties.
    pub(super) fn run_own_property_events(&mut self, member: &Member) {
        let bound: Vec<Arc<EventData>> = self
            .signal_events
            .values()
            .flatten()
            .filter(|event| event.rule.is_none() && event.member == *member)
            .map(|event| Arc::clone(&event.data))
            .collect();
        for data in bound {
            self.run_actions(&data.group, &data.actions);
        }
    }

    fn is_bound(&self, data: &Arc<EventData>) -> bool {
        self.signal_events
            .values()
            .flatten()
            .any(|event| Arc::ptr_eq(&event.data, data))
    }

    fn is_timer_bound(&self, data: &Arc<EventData>) -> bool {
        self.timer_events
            .values()
            .flatten()
            .any(|event| Arc::ptr_eq(&event.data, data))
    }

    pub(crate) fn run_actions(&mut self, group: &Group, actions: &[Action]) {
        for action in actions {
            actions::run(self, group, action);
        }
    }
}
