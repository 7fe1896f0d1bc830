//! Inspect command implementation

use anyhow::Result;
use clap::Args;
use pxit_core::symbol::symbols_to_bytes;
use pxit_core::{Checksum, Classification, ColorSampler, Packet};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::formats::read_targa;
use crate::utils::check_frame_size;

#[derive(Args)]
pub struct InspectCommand {
    /// Frame images to inspect
    #[arg(value_name = "IMAGES", required = true)]
    pub images: Vec<PathBuf>,

    /// Print a JSON report instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct FrameReport {
    path: PathBuf,
    /// Packet cells that could not be classified
    unclassifiable_cells: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    packet: Option<PacketReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct PacketReport {
    checksum_valid: bool,
    file_length: usize,
    sequence: u16,
    blocks: usize,
    checksum: String,
}

impl InspectCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        let sampler = ColorSampler::new(config.geometry, config.classifier)?;
        let checksum = Checksum::new();

        let reports: Vec<FrameReport> = self
            .images
            .iter()
            .map(|path| match inspect(path, config, &sampler, &checksum) {
                Ok(report) => report,
                Err(e) => FrameReport {
                    path: path.clone(),
                    unclassifiable_cells: 0,
                    packet: None,
                    error: Some(format!("{:#}", e)),
                },
            })
            .collect();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        } else {
            output_table(&reports);
        }
        Ok(())
    }
}

fn inspect(
    path: &Path,
    config: &Config,
    sampler: &ColorSampler,
    checksum: &Checksum,
) -> Result<FrameReport> {
    let frame = read_targa(path)?;
    check_frame_size(&frame, &config.geometry)?;

    let classifications: Vec<Classification> = sampler
        .classify_cells(&frame)?
        .take(config.geometry.symbols_per_packet())
        .collect();
    let symbols: Option<Vec<_>> = classifications.iter().map(|c| c.symbol()).collect();
    let unclassifiable_cells = classifications
        .iter()
        .filter(|&&c| c == Classification::Unclassifiable)
        .count();

    let packet = symbols
        .and_then(|symbols| Packet::from_bytes(symbols_to_bytes(&symbols)))
        .map(|packet| {
            let header = packet.header();
            PacketReport {
                checksum_valid: packet.verify(checksum),
                file_length: header.file_length,
                sequence: header.sequence,
                blocks: config.geometry.blocks_needed(header.file_length),
                checksum: hex::encode(packet.checksum()),
            }
        });

    Ok(FrameReport {
        path: path.to_path_buf(),
        unclassifiable_cells,
        packet,
        error: None,
    })
}

fn output_table(reports: &[FrameReport]) {
    println!("┌──────────────────────────────┬──────────┬──────────┬──────────┬──────────┬──────────┐");
    println!("│ Image                        │ Length   │ Sequence │ Blocks   │ Checksum │ Verdict  │");
    println!("├──────────────────────────────┼──────────┼──────────┼──────────┼──────────┼──────────┤");

    for report in reports {
        let name = report
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match &report.packet {
            Some(packet) => println!(
                "│ {:<28} │ {:<8} │ {:<8} │ {:<8} │ {:<8} │ {:<8} │",
                name,
                packet.file_length,
                packet.sequence,
                packet.blocks,
                packet.checksum,
                if packet.checksum_valid { "✅ valid" } else { "❌ bad" }
            ),
            None => println!(
                "│ {:<28} │ {:<8} │ {:<8} │ {:<8} │ {:<8} │ {:<8} │",
                name, "?", "?", "?", "?", "❌ unread"
            ),
        }
    }
    println!("└──────────────────────────────┴──────────┴──────────┴──────────┴──────────┴──────────┘");

    for report in reports {
        if let Some(error) = &report.error {
            println!("⚠️  {}: {}", report.path.display(), error);
        } else if report.packet.is_none() {
            println!(
                "⚠️  {}: {} unclassifiable cells",
                report.path.display(),
                report.unclassifiable_cells
            );
        }
    }
}
