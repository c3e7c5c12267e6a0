//! Run configuration.
//!
//! Values come from an optional TOML file; any key the file leaves out keeps
//! its default. Command-line flags are applied on top by the caller.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub session: SessionConfig,
    pub display: DisplayConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub visibility_range: usize,
    /// Turn budget for the whole run.
    pub max_ticks: u64,
    /// Consecutive `Action::None` turns tolerated before giving up.
    pub stuck_limit: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayConfig {
    pub tick_rate_ms: u64,
}

// ── TOML schema ──

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    #[serde(default)]
    session: TomlSession,
    #[serde(default)]
    display: TomlDisplay,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TomlSession {
    #[serde(default = "default_visibility_range")]
    visibility_range: usize,
    #[serde(default = "default_max_ticks")]
    max_ticks: u64,
    #[serde(default = "default_stuck_limit")]
    stuck_limit: u32,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TomlDisplay {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
}

// ── Defaults ──

fn default_visibility_range() -> usize { 3 }
fn default_max_ticks() -> u64 { 10_000 }
fn default_stuck_limit() -> u32 { 2 }
fn default_tick_rate() -> u64 { 150 }

impl Default for TomlSession {
    fn default() -> Self {
        TomlSession {
            visibility_range: default_visibility_range(),
            max_ticks: default_max_ticks(),
            stuck_limit: default_stuck_limit(),
        }
    }
}

impl Default for TomlDisplay {
    fn default() -> Self {
        TomlDisplay {
            tick_rate_ms: default_tick_rate(),
        }
    }
}

impl From<TomlConfig> for Config {
    fn from(toml: TomlConfig) -> Self {
        Config {
            session: SessionConfig {
                visibility_range: toml.session.visibility_range,
                max_ticks: toml.session.max_ticks,
                stuck_limit: toml.session.stuck_limit,
            },
            display: DisplayConfig {
                tick_rate_ms: toml.display.tick_rate_ms,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        TomlConfig::default().into()
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Config> {
        let toml: TomlConfig = toml::from_str(content).context("Failed to parse config TOML")?;
        let config: Config = toml.into();
        if config.session.stuck_limit == 0 {
            anyhow::bail!("session.stuck_limit must be at least 1");
        }
        Ok(config)
    }

    /// Reads the file at `path`, or returns the defaults when no file was
    /// given.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let Some(path) = path else {
            return Ok(Config::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Config::from_toml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}
