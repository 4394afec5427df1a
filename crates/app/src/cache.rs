//! Per-zone property cache.
//!
//! Maps object path → interface → property → last observed value. Entries
//! appear on first observation, are overwritten by every new one and are
//! only dropped when their interface is reported removed.

use std::collections::BTreeMap;

use fanzone_domain::property::PropertyValue;

type Properties = BTreeMap<String, PropertyValue>;

#[derive(Debug, Default, Clone)]
pub struct PropertyCache {
    objects: BTreeMap<String, BTreeMap<String, Properties>>,
}

impl PropertyCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, path: &str, interface: &str, property: &str) -> Option<&PropertyValue> {
        self.objects.get(path)?.get(interface)?.get(property)
    }

    pub fn set(&mut self, path: &str, interface: &str, property: &str, value: PropertyValue) {
        self.objects
            .entry(path.to_string())
            .or_default()
            .entry(interface.to_string())
            .or_default()
            .insert(property.to_string(), value);
    }

    /// Forget every property cached under `interface` on `path`.
    pub fn remove_interface(&mut self, path: &str, interface: &str) {
        if let Some(interfaces) = self.objects.get_mut(path) {
            interfaces.remove(interface);
            if interfaces.is_empty() {
                self.objects.remove(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_last_observed_value() {
        let mut cache = PropertyCache::new();
        cache.set("/a", "i", "p", PropertyValue::Int64(1));
        cache.set("/a", "i", "p", PropertyValue::Int64(2));
        assert_eq!(cache.get("/a", "i", "p"), Some(&PropertyValue::Int64(2)));
    }

    #[test]
    fn should_miss_when_never_observed() {
        let cache = PropertyCache::new();
        assert_eq!(cache.get("/a", "i", "p"), None);
    }

    #[test]
    fn should_drop_only_removed_interface() {
        let mut cache = PropertyCache::new();
        cache.set("/a", "i1", "p", PropertyValue::Bool(true));
        cache.set("/a", "i2", "p", PropertyValue::Bool(false));
        cache.remove_interface("/a", "i1");
        assert_eq!(cache.get("/a", "i1", "p"), None);
        assert_eq!(cache.get("/a", "i2", "p"), Some(&PropertyValue::Bool(false)));
    }
}
