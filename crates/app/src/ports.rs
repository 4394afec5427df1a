//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the control engine and the outside
//! world. They live here (in `app`) so that both the engine and the adapter
//! crates can depend on them without creating circular dependencies.

pub mod bus;
pub mod mode_store;

pub use bus::{BusSignal, PropertyBus, PropertyMap, SubTree};
pub use mode_store::ModeStore;
