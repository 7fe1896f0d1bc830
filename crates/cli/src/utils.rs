//! Utility functions

use anyhow::{Context, Result};
use pxit_core::{Geometry, PixelBuffer};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CliError;

/// Format bytes as human-readable size
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Name of the `index`th of `total` frames, zero padded so that
/// lexicographic order is playback order.
pub fn frame_file_name(stem: &str, index: usize, total: usize) -> String {
    let digits = total.saturating_sub(1).to_string().len().max(2);
    format!("{}-{:0width$}.tga", stem, index, width = digits)
}

/// Every `.tga` file in `dir`, sorted by name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut images = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_targa = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tga"));
        if path.is_file() && is_targa {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// A fresh output path named after the current local time.
///
/// A numeric suffix is added if a file of that name already exists.
pub fn timestamped_path(dir: &Path, extension: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let mut path = dir.join(format!("{}.{}", stamp, extension));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{}-{}.{}", stamp, n, extension));
        n += 1;
    }
    path
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    Ok(())
}

/// Rejects images whose dimensions do not match the configured geometry.
pub fn check_frame_size(frame: &PixelBuffer, geometry: &Geometry) -> Result<(), CliError> {
    if !frame.matches(geometry) {
        return Err(CliError::ImageSize {
            width: frame.width(),
            height: frame.height(),
            expected_width: geometry.width,
            expected_height: geometry.height,
        });
    }
    Ok(())
}

/// File name without its final extension, e.g. `capture` for `capture.tga`.
pub fn base_path(path: &Path) -> PathBuf {
    path.with_extension("")
}

/// `base` with `suffix` appended to its file name.
pub fn sibling(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
