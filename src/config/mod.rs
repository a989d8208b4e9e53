//! Configuration management for Skiff.
//!
//! Provides XDG-compliant settings storage with built-in defaults.

mod settings;

pub use settings::{AppSettings, Paths};
