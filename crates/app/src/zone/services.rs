//! Service resolution and per-group ownership records.

use std::collections::BTreeMap;

use fanzone_domain::error::{BusError, FanControlError};
use fanzone_domain::group::Group;

use super::Zone;
use crate::ports::{ModeStore, PropertyBus};

/// A service backing group members, and whether it currently has an owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    pub has_owner: bool,
}

impl<B: PropertyBus, S: ModeStore> Zone<B, S> {
    /// Resolve the service providing `interface` on `path`.
    ///
    /// Answers from the zone's service tree cache, refreshing it from the
    /// mapper on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`FanControlError::ServiceResolution`] when the mapper call
    /// fails or nothing provides the interface on that path.
    pub fn get_service(&mut self, path: &str, interface: &str) -> Result<String, FanControlError> {
        if let Some(name) = self.cached_service(path, interface) {
            return Ok(name);
        }
        self.add_services(path, interface, 0)
    }

    fn cached_service(&self, path: &str, interface: &str) -> Option<String> {
        self.service_tree
            .get(path)?
            .iter()
            .find(|(_, interfaces)| interfaces.iter().any(|i| i == interface))
            .map(|(name, _)| name.clone())
    }

    fn add_services(&mut self, path: &str, interface: &str, depth: i32) -> Result<String, FanControlError> {
        let objects = self
            .bus
            .get_sub_tree("/", interface, depth)
            .map_err(|source| FanControlError::ServiceResolution {
                path: path.to_string(),
                interface: interface.to_string(),
                source,
            })?;
        for (object, services) in objects {
            let cached = self.service_tree.entry(object).or_default();
            for (service, interfaces) in services {
                let known = cached.entry(service).or_default();
                for added in interfaces {
                    if !known.contains(&added) {
                        known.push(added);
                    }
                }
            }
        }
        self.cached_service(path, interface)
            .ok_or_else(|| FanControlError::ServiceResolution {
                path: path.to_string(),
                interface: interface.to_string(),
                source: BusError::ServiceNotFound {
                    path: path.to_string(),
                    interface: interface.to_string(),
                },
            })
    }

    /// Re-resolve every member's service and its ownership.
    ///
    /// Members whose service cannot be resolved are recorded under the
    /// empty service name as unowned.
    pub fn set_services(&mut self, group: &Group) {
        self.remove_service(group, "");
        let mut owners: BTreeMap<String, bool> = BTreeMap::new();
        for member in group {
            let (name, has_owner) = match self.get_service(&member.path, &member.interface) {
                Ok(name) => {
                    let has_owner = match owners.get(&name) {
                        Some(has_owner) => *has_owner,
                        None => {
                            let has_owner = self.name_has_owner(&name);
                            owners.insert(name.clone(), has_owner);
                            has_owner
                        }
                    };
                    (name, has_owner)
                }
                Err(err) => {
                    tracing::debug!(zone = self.number, %member, %err, "recording member service as unowned");
                    (String::new(), false)
                }
            };
            self.set_service_owner(group, &name, has_owner);
        }
    }

    /// Record ownership of each distinct resolvable member service.
    pub(super) fn refresh_service_owners(&mut self, group: &Group) {
        let mut last = String::new();
        for member in group {
            match self.get_service(&member.path, &member.interface) {
                Ok(name) if name != last => {
                    let has_owner = self.name_has_owner(&name);
                    self.set_service_owner(group, &name, has_owner);
                    last = name;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(zone = self.number, %member, %err, "skipping unresolvable service");
                    last.clear();
                }
            }
        }
    }

    fn name_has_owner(&self, name: &str) -> bool {
        self.bus.name_has_owner(name).unwrap_or_else(|err| {
            tracing::warn!(zone = self.number, service = %name, %err, "failed to query name owner");
            false
        })
    }
}

impl<B, S> Zone<B, S> {
    /// Update or add the ownership record of `name` for `group`.
    pub fn set_service_owner(&mut self, group: &Group, name: &str, has_owner: bool) {
        let services = self.services.entry(group.clone()).or_default();
        match services.iter_mut().find(|service| service.name == name) {
            Some(service) => service.has_owner = has_owner,
            None => services.push(Service {
                name: name.to_string(),
                has_owner,
            }),
        }
    }

    pub fn remove_service(&mut self, group: &Group, name: &str) {
        if let Some(services) = self.services.get_mut(group) {
            services.retain(|service| service.name != name);
        }
    }

    /// Ownership records of `group`, empty when none were resolved.
    #[must_use]
    pub fn services(&self, group: &Group) -> &[Service] {
        self.services.get(group).map_or(&[], Vec::as_slice)
    }

    /// Whether any recorded service of `group` lacks an owner.
    #[must_use]
    pub fn any_missing_owner(&self, group: &Group) -> bool {
        self.services(group).iter().any(|service| !service.has_owner)
    }
}
