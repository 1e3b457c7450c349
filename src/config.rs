//! Configuration management with TOML, environment variables, and CLI overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Proxy URL (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Base politeness delay between page fetches in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Random jitter added to the politeness delay (0 to this value)
    #[serde(default = "default_delay_jitter_ms")]
    pub delay_jitter_ms: u64,

    /// Delay between injecting a worker and dispatching its start command
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Upper bound on waiting for a tab to finish loading
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    /// Pause between result pages so client-side rendering settles
    #[serde(default = "default_page_gap_delay_ms")]
    pub page_gap_delay_ms: u64,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_delay_ms() -> u64 {
    2000
}

fn default_delay_jitter_ms() -> u64 {
    3000
}

fn default_settle_delay_ms() -> u64 {
    2000
}

fn default_load_timeout_ms() -> u64 {
    10_000
}

fn default_page_gap_delay_ms() -> u64 {
    2000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proxy: None,
            delay_ms: default_delay_ms(),
            delay_jitter_ms: default_delay_jitter_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            load_timeout_ms: default_load_timeout_ms(),
            page_gap_delay_ms: default_page_gap_delay_ms(),
            format: OutputFormat::Table,
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        let local_config = Path::new("config.toml");
        if local_config.exists() {
            debug!("Found config.toml in current directory");
            return Self::from_file(local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("pe-crawler").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(proxy) = std::env::var("PE_PROXY") {
            self.proxy = Some(proxy);
        }

        if let Ok(delay) = std::env::var("PE_DELAY") {
            if let Ok(d) = delay.parse() {
                self.delay_ms = d;
            }
        }

        self
    }

    /// The timer values the supervisor and page walker run on.
    pub fn timing(&self) -> Timing {
        Timing {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            load_timeout: Duration::from_millis(self.load_timeout_ms),
            page_gap_delay: Duration::from_millis(self.page_gap_delay_ms),
        }
    }
}

/// Explicit timer values, passed in rather than hardcoded so tests can shrink
/// them.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Wait after worker injection before dispatching the start command.
    pub settle_delay: Duration,
    /// Bound on waiting for a tab load; the walk proceeds regardless after.
    pub load_timeout: Duration,
    /// Pause between result pages.
    pub page_gap_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Config::default().timing()
    }
}

impl Timing {
    /// All-zero delays, for tests.
    pub fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            load_timeout: Duration::ZERO,
            page_gap_delay: Duration::ZERO,
        }
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Markdown,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use: table, json, markdown, csv", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}
