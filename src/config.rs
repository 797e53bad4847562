use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_BASE_URL: &str = "TRENDCLOUD_API_BASE_URL";

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub cloud: CloudConfig,
    pub report: ReportConfig,
    pub ui: UiConfig,
}

/// Settings handed to the transport. Nothing else reads them.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CloudConfig {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
    pub min_font_size: f64,
    pub max_font_size: f64,
    pub mention_divisor: f64,
    /// Rotation choices in degrees.
    pub rotations: Vec<i32>,
    pub seed: Option<u64>,
    pub max_spiral_steps: usize,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 400.0,
            padding: 5.0,
            min_font_size: 20.0,
            max_font_size: 100.0,
            mention_divisor: 10.0,
            rotations: vec![0, 90],
            seed: None,
            max_spiral_steps: 4000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub period: String,
    pub include_sentiment: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            period: "24h".to_string(),
            include_sentiment: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub hover_transition_ms: u64,
    pub tick_rate_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            hover_transition_ms: 200,
            tick_rate_ms: 50,
        }
    }
}

impl Config {
    /// `<config dir>/trendcloud/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("trendcloud").join("config.toml"))
    }

    /// Reads the config file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config at {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            if !url.trim().is_empty() {
                self.api.base_url = url;
            }
        }
        self
    }

    /// Rejects values the packer or the HTTP client cannot work with. NaN
    /// fails every comparison, so each bound is written to fail on it.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            anyhow::bail!("api.base_url must not be empty");
        }
        if self.api.timeout_ms == 0 {
            anyhow::bail!("api.timeout_ms must be at least 1");
        }

        let cloud = &self.cloud;
        if !(cloud.width > 0.0 && cloud.width.is_finite())
            || !(cloud.height > 0.0 && cloud.height.is_finite())
        {
            anyhow::bail!("cloud.width and cloud.height must be positive");
        }
        if !(cloud.padding >= 0.0 && cloud.padding.is_finite()) {
            anyhow::bail!("cloud.padding must not be negative");
        }
        if !(cloud.min_font_size > 0.0 && cloud.min_font_size <= cloud.max_font_size)
            || !cloud.max_font_size.is_finite()
        {
            anyhow::bail!("cloud.min_font_size must be positive and not exceed max_font_size");
        }
        if !(cloud.mention_divisor > 0.0 && cloud.mention_divisor.is_finite()) {
            anyhow::bail!("cloud.mention_divisor must be positive");
        }
        if cloud.rotations.is_empty() {
            anyhow::bail!("cloud.rotations needs at least one angle");
        }
        Ok(())
    }
}
