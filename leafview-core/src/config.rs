use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

use crate::scale::{BusyPolicy, DEFAULT_MAX_SCALE};
use crate::state::DEFAULT_SCALE_RATE;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub scale_rate: f32,
    pub initial_scale: f32,
    /// Zoom-in stops here.
    pub max_scale: f32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "scroll_duration_ms")]
    pub scroll_duration: Duration,
    /// Added to a page's top when navigating so the scroll lands inside it.
    pub landing_offset: f32,
    pub busy_policy: BusyPolicy,
    pub page_gap: f32,
    /// Distance from the end of the loaded pages at which the next page is
    /// requested.
    pub load_threshold: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_pixel_ratio: Option<f32>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            scale_rate: DEFAULT_SCALE_RATE,
            initial_scale: 1.0,
            max_scale: DEFAULT_MAX_SCALE,
            scroll_duration: Duration::from_millis(3000),
            landing_offset: 10.0,
            busy_policy: BusyPolicy::default(),
            page_gap: 0.0,
            load_threshold: 100.0,
            device_pixel_ratio: None,
        }
    }
}

impl ViewerConfig {
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("net", "leafview", "leafview")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Reads `path`, falling back to the defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        Self::from_toml_str(&raw).with_context(|| format!("invalid config file {:?}", path))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.scale_rate > 0.0) {
            bail!("scale_rate must be positive, got {}", self.scale_rate);
        }
        if !(self.initial_scale > 0.0) {
            bail!("initial_scale must be positive, got {}", self.initial_scale);
        }
        if !(self.max_scale >= self.initial_scale) {
            bail!(
                "max_scale must be at least initial_scale ({}), got {}",
                self.initial_scale,
                self.max_scale
            );
        }
        if let Some(ratio) = self.device_pixel_ratio {
            if !(ratio > 0.0) {
                bail!("device_pixel_ratio must be positive, got {}", ratio);
            }
        }
        Ok(())
    }
}
