//! Encode command implementation

use anyhow::{Context, Result};
use clap::Args;
use log::{debug, info};
use pxit_core::FrameEncoder;
use std::fs;
use std::path::PathBuf;

use crate::config::Config;
use crate::formats::{encode_targa, write_targa, ImageDepth};
use crate::utils::{ensure_dir, format_bytes, frame_file_name};

#[derive(Args)]
pub struct EncodeCommand {
    /// File to send
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Output directory for frame images
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Copies of the last frame appended after the file
    #[arg(long, value_name = "N")]
    pub trailer: Option<usize>,

    /// Bits per pixel of the written images
    #[arg(long, value_enum)]
    pub depth: Option<ImageDepth>,
}

impl EncodeCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        let data = fs::read(&self.input)
            .with_context(|| format!("Failed to read file: {}", self.input.display()))?;

        let encoder = FrameEncoder::new(config.geometry, &data)
            .with_context(|| format!("Cannot encode {}", self.input.display()))?;

        let depth = match self.depth {
            Some(depth) => depth,
            None => ImageDepth::from_bits(config.encoder.image_depth)?,
        };
        let trailer = self.trailer.unwrap_or(config.encoder.trailer_frames);
        let blocks = encoder.blocks();
        let total = blocks + trailer;

        let output_dir = self
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        ensure_dir(&output_dir)?;

        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frame".to_string());

        info!(
            "Encoding {} ({}) into {} blocks",
            self.input.display(),
            format_bytes(data.len()),
            blocks
        );

        let mut last = None;
        for (index, frame) in encoder.enumerate() {
            let path = output_dir.join(frame_file_name(&stem, index, total));
            debug!("Writing {}", path.display());
            write_targa(&path, &frame, depth)?;
            last = Some(frame);
        }

        // Repeat the final frame so a receiver that joined late still sees it
        if let Some(frame) = last {
            let bytes = encode_targa(&frame, depth)?;
            for index in blocks..total {
                let path = output_dir.join(frame_file_name(&stem, index, total));
                fs::write(&path, &bytes)
                    .with_context(|| format!("Failed to write image: {}", path.display()))?;
            }
        }

        println!(
            "✅ Encoded {} into {} frames ({} data, {} trailer)",
            self.input.display(),
            total,
            blocks,
            trailer
        );
        println!("Frames saved to: {}", output_dir.display());

        Ok(())
    }
}
