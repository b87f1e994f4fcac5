//! # Configuration Module
//!
//! Runtime defaults for planning, stored as JSON in the platform-standard
//! config directory:
//!
//! - Linux: `~/.config/mixpath/config.json`
//! - macOS: `~/Library/Application Support/mixpath/config.json`
//! - Windows: `%APPDATA%\mixpath\config.json`
//!
//! Every field is optional in the file. Command line flags override the file,
//! which overrides the built-in defaults.

use crate::model::{AlgorithmVariant, SearchOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the platform-appropriate config directory for Mixpath, creating
/// it if needed.
///
/// # Errors
///
/// Fails if the system config directory cannot be determined or the
/// `mixpath` subdirectory cannot be created.
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system config directory. Please ensure your platform supports standard config directories."
        )
    })?;

    let mixpath_dir = config_dir.join("mixpath");
    fs::create_dir_all(&mixpath_dir).with_context(|| {
        format!(
            "Failed to create Mixpath config directory at {}. Please check file permissions.",
            mixpath_dir.display()
        )
    })?;

    Ok(mixpath_dir)
}

/// Path of the default config file.
///
/// # Errors
///
/// See [`get_config_dir`].
///
/// # Examples
///
/// ```no_run
/// use mixpath::config::get_config_path;
///
/// let path = get_config_path()?;
/// println!("Config location: {}", path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.json"))
}

/// Defaults applied to every plan unless overridden on the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub tolerance_minutes: f64,
    pub prefer_key_matching: bool,
    pub waypoint_slack_minutes: f64,
    pub step_budget: u64,
    pub max_detour_hops: usize,
    pub algorithm_variant: AlgorithmVariant,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let search = SearchOptions::default();
        Self {
            tolerance_minutes: 5.0,
            prefer_key_matching: true,
            waypoint_slack_minutes: 0.0,
            step_budget: search.step_budget,
            max_detour_hops: search.max_detour_hops,
            algorithm_variant: search.algorithm_variant,
        }
    }
}

impl RuntimeConfig {
    /// Read a config file.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, unreadable or not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Read a config file, falling back to defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Fails only if an existing file cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Write the config as pretty JSON.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json).with_context(|| format!("Failed to write config file {}", path.display()))
    }

    #[must_use]
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            algorithm_variant: self.algorithm_variant,
            step_budget: self.step_budget,
            max_detour_hops: self.max_detour_hops,
        }
    }
}
