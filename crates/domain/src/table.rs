//! Value-to-speed lookup tables used by the floor and ceiling actions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One table step: sensor `value` mapped to a fan `speed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedStep {
    pub value: i64,
    pub speed: u64,
}

/// An ascending sensor-value to speed table.
///
/// Keys are unique; a later step with the same value replaces an earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SpeedStep>", into = "Vec<SpeedStep>")]
pub struct SpeedTable(BTreeMap<i64, u64>);

impl SpeedTable {
    /// Speed of the first key strictly greater than `value`.
    #[must_use]
    pub fn first_above(&self, value: i64) -> Option<u64> {
        self.0
            .iter()
            .find(|(key, _)| value < **key)
            .map(|(_, speed)| *speed)
    }

    /// Steps in ascending key order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (i64, u64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(i64, u64)> for SpeedTable {
    fn from_iter<I: IntoIterator<Item = (i64, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<SpeedStep>> for SpeedTable {
    fn from(steps: Vec<SpeedStep>) -> Self {
        steps.into_iter().map(|s| (s.value, s.speed)).collect()
    }
}

impl From<SpeedTable> for Vec<SpeedStep> {
    fn from(table: SpeedTable) -> Self {
        table
            .iter()
            .map(|(value, speed)| SpeedStep { value, speed })
            .collect()
    }
}
