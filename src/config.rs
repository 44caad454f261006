use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ascii::DEFAULT_COLUMNS;

/// Locations of the ffmpeg tools used for decoding and probing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FfmpegConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

impl FfmpegConfig {
    pub fn ffmpeg_cmd(&self) -> &str {
        &self.ffmpeg
    }

    pub fn ffprobe_cmd(&self) -> &str {
        &self.ffprobe
    }
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_width() -> u32 {
    DEFAULT_COLUMNS
}

fn default_batch_size() -> usize {
    8
}

fn default_jobs_root() -> PathBuf {
    match dirs::data_dir() {
        Some(d) => d.join("asciivid").join("jobs"),
        None => PathBuf::from("asciivid_jobs"),
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Columns per frame when the caller does not pick one
    #[serde(default = "default_width")]
    pub default_width: u32,
    /// Directory holding one subdirectory per job
    #[serde(default = "default_jobs_root")]
    pub jobs_root: PathBuf,
    /// Decoded frames converted together on the rayon pool
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_width: default_width(),
            jobs_root: default_jobs_root(),
            batch_size: default_batch_size(),
            ffmpeg: FfmpegConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a `.json` or `.toml` file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: AppConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&text).context("parsing config toml")?,
            _ => serde_json::from_str(&text).context("parsing config json")?,
        };
        cfg.validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_width == 0 {
            return Err(anyhow!("default_width must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(anyhow!("batch_size must be at least 1"));
        }
        Ok(())
    }
}

/// Candidate config files, most specific first.
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut tried: Vec<PathBuf> = Vec::new();
    if let Some(d) = dirs::data_dir() {
        let d = d.join("asciivid");
        tried.push(d.join("asciivid.json"));
        tried.push(d.join("asciivid.toml"));
    }
    tried.push(PathBuf::from("asciivid.json"));
    tried.push(PathBuf::from("asciivid.toml"));
    tried
}

/// Look for a config file in the app data dir, then the current dir, then fall
/// back to built-in defaults.
pub fn load_config() -> Result<AppConfig> {
    for p in config_search_paths() {
        if p.exists() {
            log::debug!("loading config from {}", p.display());
            return AppConfig::from_file(&p);
        }
    }
    Ok(AppConfig::default())
}
