//! Configuration module for the view compiler.
//!
//! Handles compiler and validator settings loaded from TOML.

mod settings;

pub use settings::{CompilerSettings, RejectionPolicy, Settings, SettingsError, ValidatorSettings};
