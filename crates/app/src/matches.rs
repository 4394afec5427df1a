//! Signal match rules.
//!
//! A [`MatchRule`] is built per group member when a signal trigger is bound.
//! It renders as the bus match string handed to
//! [`PropertyBus::add_match`](crate::ports::PropertyBus::add_match) and also
//! decides locally whether a delivered [`BusSignal`] concerns it.

use fanzone_domain::group::Member;
use fanzone_domain::rule::SignalKind;

use crate::ports::BusSignal;

const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
const OBJECT_MANAGER_INTERFACE: &str = "org.freedesktop.DBus.ObjectManager";
const BUS_NAME: &str = "org.freedesktop.DBus";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRule {
    PropertiesChanged { path: String, interface: String },
    InterfacesAdded { path: String },
    InterfacesRemoved { path: String },
    NameOwnerChanged { name: String },
}

impl MatchRule {
    /// Rule for `kind` scoped to `member`.
    ///
    /// `service` is the member's owning service, only used for ownership
    /// changes.
    #[must_use]
    pub fn new(kind: SignalKind, member: &Member, service: &str) -> Self {
        match kind {
            SignalKind::PropertiesChanged => Self::PropertiesChanged {
                path: member.path.clone(),
                interface: member.interface.clone(),
            },
            SignalKind::InterfacesAdded => Self::InterfacesAdded {
                path: member.path.clone(),
            },
            SignalKind::InterfacesRemoved => Self::InterfacesRemoved {
                path: member.path.clone(),
            },
            SignalKind::NameOwnerChanged => Self::NameOwnerChanged {
                name: service.to_string(),
            },
        }
    }

    /// Whether `signal` is one this rule subscribes to.
    #[must_use]
    pub fn matches(&self, signal: &BusSignal) -> bool {
        match (self, signal) {
            (
                Self::PropertiesChanged { path, interface },
                BusSignal::PropertiesChanged {
                    path: p,
                    interface: i,
                    ..
                },
            ) => path == p && interface == i,
            (Self::InterfacesAdded { path }, BusSignal::InterfacesAdded { path: p, .. })
            | (Self::InterfacesRemoved { path }, BusSignal::InterfacesRemoved { path: p, .. }) => {
                path == p
            }
            (Self::NameOwnerChanged { name }, BusSignal::NameOwnerChanged { name: n, .. }) => {
                name == n
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for MatchRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PropertiesChanged { path, interface } => write!(
                f,
                "type='signal',interface='{PROPERTIES_INTERFACE}',member='PropertiesChanged',path='{path}',arg0='{interface}'"
            ),
            Self::InterfacesAdded { path } => write!(
                f,
                "type='signal',interface='{OBJECT_MANAGER_INTERFACE}',member='InterfacesAdded',arg0path='{path}'"
            ),
            Self::InterfacesRemoved { path } => write!(
                f,
                "type='signal',interface='{OBJECT_MANAGER_INTERFACE}',member='InterfacesRemoved',arg0path='{path}'"
            ),
            Self::NameOwnerChanged { name } => write!(
                f,
                "type='signal',sender='{BUS_NAME}',interface='{BUS_NAME}',member='NameOwnerChanged',arg0='{name}'"
            ),
        }
    }
}
