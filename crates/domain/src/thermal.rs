//! Thermal mode: the control property each zone exposes on the bus.

/// Interface a zone's thermal mode is exposed under.
pub const THERMAL_MODE_INTERFACE: &str = "xyz.openbmc_project.Control.ThermalMode";
/// Property listing the modes a zone accepts.
pub const SUPPORTED_PROPERTY: &str = "Supported";
/// Property holding the currently selected mode.
pub const CURRENT_PROPERTY: &str = "Current";
/// Mode every zone starts in unless configured or restored otherwise.
pub const DEFAULT_MODE: &str = "DEFAULT";

/// Supported and current thermal modes of a zone.
///
/// Modes compare case-insensitively and are stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThermalMode {
    supported: Vec<String>,
    current: String,
}

impl Default for ThermalMode {
    fn default() -> Self {
        Self {
            supported: Vec::new(),
            current: DEFAULT_MODE.to_string(),
        }
    }
}

impl ThermalMode {
    #[must_use]
    pub fn supported(&self) -> &[String] {
        &self.supported
    }

    #[must_use]
    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn set_supported(&mut self, modes: Vec<String>) {
        self.supported = modes;
    }

    /// Replace the current mode without checking it is supported.
    ///
    /// Used for the configured initial value.
    pub fn force_current(&mut self, mode: &str) {
        self.current = mode.to_uppercase();
    }

    /// Select `mode` when it is one of the supported modes.
    ///
    /// Returns the stored (upper-cased) value on success and leaves the
    /// current mode untouched otherwise.
    pub fn select(&mut self, mode: &str) -> Option<&str> {
        let upper = mode.to_uppercase();
        if !self.supported.iter().any(|s| s.to_uppercase() == upper) {
            return None;
        }
        self.current = upper;
        Some(&self.current)
    }
}
