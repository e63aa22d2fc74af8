//! TOML-based configuration for the view compiler.
//!
//! Every key is optional; a missing file section falls back to defaults.
//!
//! Example configuration:
//! ```toml
//! [compiler]
//! max_path_depth = 8
//! allow_reverse_joins = true
//!
//! [validator]
//! rejection = "fatal"          # or "any"
//! report_ambiguous_joins = true
//! check_include_cycles = true
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Resolution and compilation settings.
    pub compiler: CompilerSettings,

    /// Plan validation settings.
    pub validator: ValidatorSettings,
}

/// Resolution and compilation settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Maximum number of segments in a member path.
    pub max_path_depth: usize,

    /// Allow a join to be walked from its target back to its owner.
    pub allow_reverse_joins: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            max_path_depth: 8,
            allow_reverse_joins: true,
        }
    }
}

/// When does a validated plan get rejected?
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// Any fatal diagnostic rejects; advisories are reported only.
    #[default]
    Fatal,
    /// Any diagnostic at all rejects.
    Any,
}

/// Plan validation settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidatorSettings {
    pub rejection: RejectionPolicy,

    /// Emit advisory diagnostics for ambiguous join ties.
    pub report_ambiguous_joins: bool,

    /// Check the include graph around the plan's entity for cycles.
    pub check_include_cycles: bool,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            rejection: RejectionPolicy::Fatal,
            report_ambiguous_joins: true,
            check_include_cycles: true,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Parse settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.compiler.max_path_depth == 0 {
            return Err(SettingsError::InvalidConfig(
                "compiler.max_path_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
