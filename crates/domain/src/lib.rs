//! # fanzone-domain
//!
//! Pure domain model for the fanzone fan-speed control engine.
//!
//! ## Responsibilities
//! - Foundational types: error taxonomy, property values and their typed
//!   extraction rules
//! - Define **Groups** (ordered sets of object-path / interface / property
//!   locators a rule depends on)
//! - Define **Rules** (`SetSpeedEvent`: group + actions + triggers) and the
//!   closed set of [`Action`](rule::Action) and [`Trigger`](rule::Trigger) kinds
//! - Define **Zone layouts** (zones, fans, platform conditions) as plain
//!   deserializable configuration values
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod group;
pub mod property;
pub mod table;

pub mod layout;
pub mod rule;
pub mod thermal;
pub mod zone;

mod serde_secs;
