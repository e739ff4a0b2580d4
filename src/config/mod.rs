//! Configuration management for vulnscan.
//!
//! Provides XDG-compliant settings storage and the conversion of settings
//! into engine configuration.

mod settings;

pub use settings::{AppSettings, Paths};
