//! Run configuration, loaded from an optional `slam.conl`

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "slam.conl";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub csv: PathBuf,
    pub template: PathBuf,
    pub output_dir: PathBuf,
    /// Copied into the output directory and used as the slam book cover
    pub cover_image: PathBuf,
    pub title: String,
    pub name_column: String,
    pub photo_column: String,
    pub timestamp_column: String,
    pub fetch: FetchConfig,
    pub image: ImageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Total attempts per photo, including the first
    pub attempts: u32,
    /// Back-off before retry N is N times this
    pub retry_backoff_ms: u64,
    /// Pause after each network fetch
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageConfig {
    /// Longest edge of a converted photo, in pixels
    pub max_dimension: u32,
    /// Lossy WebP quality, 0-100
    pub quality: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            csv: PathBuf::from("slam.csv"),
            template: PathBuf::from("template.html"),
            output_dir: PathBuf::from("output"),
            cover_image: PathBuf::from("mainPage.png"),
            title: "Slam Book".to_string(),
            name_column: "Full Name".to_string(),
            photo_column: "Add a selfie or an old photo with him".to_string(),
            timestamp_column: "Timestamp".to_string(),
            fetch: FetchConfig::default(),
            image: ImageConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            attempts: 3,
            retry_backoff_ms: 1000,
            delay_ms: 500,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1600,
            quality: 85.0,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Config {
    /// Load config from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_conl(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_conl(content: &str) -> Result<Self> {
        let config: Config = serde_conl::from_str(content)?;
        Ok(config)
    }

    pub fn page_path(&self, filename: &str) -> PathBuf {
        self.output_dir.join(filename)
    }
}
