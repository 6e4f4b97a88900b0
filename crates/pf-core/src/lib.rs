//! pf-core: Shared types, traits, and utilities for Playfield
//!
//! This crate provides the foundational types used across all Playfield crates:
//! the error taxonomy, logical time, the switch model, lamp/coil schedules,
//! hardware command interfaces and the machine configuration.

mod config;
mod error;
mod hardware;
mod lamp;
mod switch;
mod time;

pub use config::*;
pub use error::*;
pub use hardware::*;
pub use lamp::*;
pub use switch::*;
pub use time::*;
