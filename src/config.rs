// Configuration loaded from an optional YAML file

use crate::models::{DEFAULT_PALETTE, is_hex_color};
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, warn};

/// Settings from `config.yml`; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory that holds the `.taskly` storage directory
    pub data_dir: Option<PathBuf>,
    /// error, warn, info, debug or trace
    pub log_level: Option<String>,
    /// Colors for new lists, as `#RRGGBB`
    pub palette: Vec<String>,
}

impl Config {
    /// `<config_dir>/taskly/config.yml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("taskly").join("config.yml"))
    }

    /// Load from an explicit path, or from the default location if none is given
    ///
    /// A missing file at the default location yields the default config; a
    /// missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            if explicit {
                return Err(eyre!("Config file not found: {}", path.display()));
            }
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(text).context("Failed to parse YAML")?;
        config.log_level()?;
        Ok(config)
    }

    /// Where storage lives: configured dir, else the platform data dir, else `.`
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("taskly")))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn log_level(&self) -> Result<Level> {
        match &self.log_level {
            Some(level) => parse_level(level),
            None => Ok(Level::WARN),
        }
    }

    /// Configured colors with malformed entries dropped; defaults if none remain
    pub fn palette(&self) -> Vec<String> {
        let colors: Vec<String> = self
            .palette
            .iter()
            .filter(|c| {
                let ok = is_hex_color(c);
                if !ok {
                    warn!(color = %c, "Ignoring malformed palette color");
                }
                ok
            })
            .cloned()
            .collect();

        if colors.is_empty() {
            DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect()
        } else {
            colors
        }
    }
}

pub fn parse_level(level: &str) -> Result<Level> {
    level
        .trim()
        .parse::<Level>()
        .map_err(|_| eyre!("Invalid log level: {} (expected error, warn, info, debug or trace)", level))
}
