//! Engine configuration via `repcrec.toml`
//!
//! Every field is optional; an empty file yields the classic layout of
//! 10 sites and 20 variables.

use repcrec_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "repcrec.toml";

/// Engine configuration loaded from `repcrec.toml`.
///
/// # Example
///
/// ```toml
/// num_sites = 10
/// num_variables = 20
/// debug_dump = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of sites, ids `1..=num_sites`
    #[serde(default = "default_num_sites")]
    pub num_sites: u32,
    /// Number of variables, `x1..=x<num_variables>`
    #[serde(default = "default_num_variables")]
    pub num_variables: u32,
    /// Emit parked instructions and the wait-for graph alongside each dump
    #[serde(default)]
    pub debug_dump: bool,
}

fn default_num_sites() -> u32 {
    10
}

fn default_num_variables() -> u32 {
    20
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_sites: default_num_sites(),
            num_variables: default_num_variables(),
            debug_dump: false,
        }
    }
}

impl EngineConfig {
    /// Reject layouts the engine cannot run
    ///
    /// # Errors
    ///
    /// Returns an error if there are no sites.
    pub fn validate(&self) -> Result<()> {
        if self.num_sites == 0 {
            return Err(Error::Config("num_sites must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }
}
