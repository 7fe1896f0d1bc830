//! Configuration management

use anyhow::{Context, Result};
use pxit_core::{Geometry, Thresholds};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CliError;
use crate::formats::ImageDepth;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub geometry: Geometry,

    #[serde(default)]
    pub classifier: Thresholds,

    #[serde(default)]
    pub encoder: EncoderDefaults,

    #[serde(default)]
    pub decoder: DecoderDefaults,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EncoderDefaults {
    /// Copies of the last frame appended after the file
    #[serde(default = "default_trailer_frames")]
    pub trailer_frames: usize,

    /// Bits per pixel of written images (24 or 32)
    #[serde(default = "default_image_depth")]
    pub image_depth: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DecoderDefaults {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Extension given to reassembled files
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for EncoderDefaults {
    fn default() -> Self {
        Self {
            trailer_frames: default_trailer_frames(),
            image_depth: default_image_depth(),
        }
    }
}

impl Default for DecoderDefaults {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            extension: default_extension(),
        }
    }
}

fn default_trailer_frames() -> usize {
    90
}
fn default_image_depth() -> u8 {
    32
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_extension() -> String {
    "7z".to_string()
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = if let Some(config_path) = path {
            Self::load_from_file(config_path)?
        } else {
            Self::load_default()?
        };
        config.validate()?;
        Ok(config)
    }

    fn load_default() -> Result<Self> {
        let config_dirs = [
            dirs::config_dir().map(|d| d.join("pxit").join("config.toml")),
            Some(PathBuf::from("pxit.toml")),
            Some(PathBuf::from(".pxit.toml")),
        ];

        for config_path in config_dirs.into_iter().flatten() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        self.geometry
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        ImageDepth::from_bits(self.encoder.image_depth)?;
        Ok(())
    }
}
