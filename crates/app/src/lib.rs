//! # fanzone-app
//!
//! Application layer: the fan control engine and its **port definitions**.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement:
//!   - `PropertyBus`: service lookup, property get/set, match rules, signals
//!   - `ModeStore`: persist and restore a zone's thermal mode
//! - Run the engine: zones, their rule bindings, actions and preconditions
//! - Drive every zone from one control loop (`Manager`)
//!
//! ## Dependency rule
//! Depends on `fanzone-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod actions;
pub mod cache;
pub mod fan;
mod handlers;
pub mod manager;
pub mod matches;
pub mod ports;
mod preconditions;
pub mod timer;
pub mod utility;
pub mod zone;

#[cfg(test)]
mod test_support;
