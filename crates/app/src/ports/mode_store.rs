//! Mode store port: persistence of each zone's selected thermal mode.

use std::sync::Arc;

use fanzone_domain::error::PersistError;

/// Load/store pair for a zone's current thermal mode, keyed by zone number.
pub trait ModeStore {
    /// Persist `mode` for `zone`.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistError`] when the value cannot be written.
    fn save(&self, zone: usize, mode: &str) -> Result<(), PersistError>;

    /// Load the persisted mode for `zone`, `None` when nothing was saved.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistError`] when stored data exists but cannot be read
    /// or decoded.
    fn restore(&self, zone: usize) -> Result<Option<String>, PersistError>;

    /// Drop whatever is stored for `zone`.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistError`] when existing data cannot be removed.
    fn discard(&self, zone: usize) -> Result<(), PersistError>;
}

impl<T: ModeStore + ?Sized> ModeStore for Arc<T> {
    fn save(&self, zone: usize, mode: &str) -> Result<(), PersistError> {
        (**self).save(zone, mode)
    }

    fn restore(&self, zone: usize) -> Result<Option<String>, PersistError> {
        (**self).restore(zone)
    }

    fn discard(&self, zone: usize) -> Result<(), PersistError> {
        (**self).discard(zone)
    }
}
