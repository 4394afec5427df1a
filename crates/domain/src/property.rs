//! Property values carried by the cache and the property bus.
//!
//! The set of types is closed: `bool`, `int32`, `int64`, `double`,
//! `string` and `string_array`, the last only carrying a zone's supported
//! thermal modes. Typed reads go through [`PropertyValue::get`], which applies
//! the one documented compatibility rule: a sensor `Value` published as a
//! `double` still reads as a scaled `int64` (value × 1000, rounded).

use serde::{Deserialize, Serialize};

/// Interface whose `Value` property carries the legacy scaled-integer rule.
pub const SENSOR_VALUE_INTERFACE: &str = "xyz.openbmc_project.Sensor.Value";
/// Property name the scaled-integer rule applies to.
pub const SENSOR_VALUE_PROPERTY: &str = "Value";

/// A single typed property value.
///
/// In configuration files the type is explicit, e.g. `{ int64 = 45000 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyValue {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    #[serde(rename = "string_array")]
    StringArray(Vec<String>),
}

impl PropertyValue {
    /// Read this value as `T`, applying the sensor value compatibility rule
    /// when `interface`/`property` name the sensor `Value` property.
    ///
    /// Returns `None` on any other type mismatch.
    #[must_use]
    pub fn get<T: FromPropertyValue>(&self, interface: &str, property: &str) -> Option<T> {
        if interface == SENSOR_VALUE_INTERFACE && property == SENSOR_VALUE_PROPERTY {
            T::from_sensor_value(self)
        } else {
            T::from_property_value(self)
        }
    }

    /// Check whether `other`, read as this value's type, equals this value.
    ///
    /// Used to compare a configured state against a cached observation.
    #[must_use]
    pub fn matches(&self, other: &PropertyValue, interface: &str, property: &str) -> bool {
        match self {
            Self::Bool(v) => other.get::<bool>(interface, property) == Some(*v),
            Self::Int32(v) => other.get::<i32>(interface, property) == Some(*v),
            Self::Int64(v) => other.get::<i64>(interface, property) == Some(*v),
            #[allow(clippy::float_cmp)]
            Self::Double(v) => other.get::<f64>(interface, property) == Some(*v),
            Self::String(v) => other.get::<String>(interface, property).as_ref() == Some(v),
            Self::StringArray(v) => other.get::<Vec<String>>(interface, property).as_ref() == Some(v),
        }
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::StringArray(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        Self::StringArray(value)
    }
}

/// Types that can be read out of a [`PropertyValue`].
pub trait FromPropertyValue: Sized {
    /// Exact-type extraction.
    fn from_property_value(value: &PropertyValue) -> Option<Self>;

    /// Extraction for the sensor `Value` property. Defaults to exact-type.
    fn from_sensor_value(value: &PropertyValue) -> Option<Self> {
        Self::from_property_value(value)
    }
}

impl FromPropertyValue for bool {
    fn from_property_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromPropertyValue for i32 {
    fn from_property_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Int32(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromPropertyValue for i64 {
    fn from_property_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_sensor_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Double(v) => Some((v * 1000.0).round() as i64),
            other => Self::from_property_value(other),
        }
    }
}

impl FromPropertyValue for f64 {
    fn from_property_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Double(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromPropertyValue for String {
    fn from_property_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::String(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromPropertyValue for Vec<String> {
    fn from_property_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::StringArray(v) => Some(v.clone()),
            _ => None,
        }
    }
}
