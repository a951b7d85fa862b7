//! Configuration for monitors and the page bridge
//!
//! Resolution order: built-in defaults, then the JSON config file
//! (`--config FILE` or `~/.pagewatch/config.json`), then `PAGEWATCH_*`
//! environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::monitors::{ConsoleMonitor, DomMonitor, NetworkMonitor};

/// Buffer sizes and context rendering options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub console_capacity: usize,
    pub network_capacity: usize,
    pub dom_max_changes: usize,
    /// Show only the most recent N lines in list context blocks
    pub context_entry_limit: Option<usize>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            console_capacity: ConsoleMonitor::DEFAULT_CAPACITY,
            network_capacity: NetworkMonitor::DEFAULT_CAPACITY,
            dom_max_changes: DomMonitor::DEFAULT_MAX_CHANGES,
            context_entry_limit: None,
        }
    }
}

/// How the CLI reaches the browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub browser: String,
    /// Explicit WebDriver endpoint; derived from the browser when unset
    pub webdriver_url: Option<String>,
    pub poll_interval_ms: u64,
    pub headless: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            browser: "firefox".to_string(),
            webdriver_url: None,
            poll_interval_ms: 250,
            headless: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub monitors: MonitorConfig,
    pub bridge: BridgeConfig,
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid configuration value for {}: {} ({})", key, value, e))
}

impl Settings {
    /// `~/.pagewatch/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".pagewatch").join("config.json"))
    }

    /// Resolve settings from file and process environment
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => Self::default(),
            },
        };
        settings.apply_env(std::env::vars())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid configuration file {}", path.display()))
    }

    /// Apply `PAGEWATCH_*` overrides; unrelated variables are ignored
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                "PAGEWATCH_CONSOLE_CAPACITY" => {
                    self.monitors.console_capacity = parse_var(&key, &value)?
                }
                "PAGEWATCH_NETWORK_CAPACITY" => {
                    self.monitors.network_capacity = parse_var(&key, &value)?
                }
                "PAGEWATCH_DOM_MAX_CHANGES" => {
                    self.monitors.dom_max_changes = parse_var(&key, &value)?
                }
                "PAGEWATCH_CONTEXT_LIMIT" => {
                    self.monitors.context_entry_limit = Some(parse_var(&key, &value)?)
                }
                "PAGEWATCH_BROWSER" => self.bridge.browser = value.trim().to_string(),
                "PAGEWATCH_WEBDRIVER_URL" => self.bridge.webdriver_url = Some(value),
                "PAGEWATCH_POLL_MS" => self.bridge.poll_interval_ms = parse_var(&key, &value)?,
                "PAGEWATCH_HEADLESS" => self.bridge.headless = parse_var(&key, &value)?,
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let monitors = &self.monitors;
        for (name, value) in [
            ("console_capacity", monitors.console_capacity),
            ("network_capacity", monitors.network_capacity),
            ("dom_max_changes", monitors.dom_max_changes),
        ] {
            if value == 0 {
                anyhow::bail!("Invalid configuration: {} must be greater than 0", name);
            }
        }
        if monitors.context_entry_limit == Some(0) {
            anyhow::bail!("Invalid configuration: context_entry_limit must be greater than 0");
        }
        if self.bridge.poll_interval_ms == 0 {
            anyhow::bail!("Invalid configuration: poll_interval_ms must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
