//! Zone layout: the platform-variant selection tree.
//!
//! A [`Layout`] is the whole static configuration handed to the manager: a
//! power-on delay and an ordered list of [`ZoneGroup`]s, each guarded by
//! [`Condition`]s evaluated against live properties.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::group::Member;
use crate::property::PropertyValue;
use crate::zone::ZoneDefinition;

/// A single property equality check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionProperty {
    #[serde(flatten)]
    pub member: Member,
    pub value: PropertyValue,
}

/// Matches when every one of its properties matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub properties: Vec<ConditionProperty>,
}

/// Zones applied when every condition matches.
///
/// A group with no conditions always matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneGroup {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub zones: Vec<ZoneDefinition>,
}

/// The full static fan control configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(with = "crate::serde_secs")]
    pub power_on_delay: Duration,
    pub zone_groups: Vec<ZoneGroup>,
}
