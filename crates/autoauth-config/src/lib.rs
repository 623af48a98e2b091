//! Configuration parsing for autoauth
//!
//! This crate owns the configuration surface:
//! - Global configuration (`~/.config/autoauth/config.toml`)
//! - The ordered `[[patterns]]` table mapping path regexes to credential queries

mod error;
mod global;

pub use error::*;
pub use global::*;
