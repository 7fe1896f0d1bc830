//! Decode command implementation

use anyhow::{bail, Context, Result};
use clap::Args;
use log::{debug, error, info, warn};
use pxit_core::{BlockSink, FrameAssembler, FrameOutcome, PxitError, SinkFactory, ThreadedSink};
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::formats::read_targa;
use crate::utils::{check_frame_size, ensure_dir, list_images, timestamped_path};

#[derive(Args)]
pub struct DecodeCommand {
    /// Directory of frame images
    #[arg(value_name = "DIR")]
    pub input: PathBuf,

    /// Output directory for reassembled files
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

/// Opens a timestamp-named file per transfer, written on a background thread.
pub(crate) struct FileSinkFactory {
    dir: PathBuf,
    extension: String,
}

impl FileSinkFactory {
    pub(crate) fn new(dir: &Path, extension: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
        }
    }
}

impl SinkFactory for FileSinkFactory {
    type Sink = ThreadedSink<FileSink>;

    fn open(&mut self, file_length: usize) -> io::Result<Self::Sink> {
        let path = timestamped_path(&self.dir, &self.extension);
        let file = File::create(&path)?;
        file.set_len(file_length as u64)?;
        debug!("Created {}", path.display());
        ThreadedSink::spawn(FileSink { file, path })
    }
}

pub(crate) struct FileSink {
    file: File,
    path: PathBuf,
}

impl BlockSink for FileSink {
    type Output = PathBuf;

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)
    }

    fn close(self) -> io::Result<PathBuf> {
        self.file.sync_all()?;
        Ok(self.path)
    }
}

#[derive(Debug, Default)]
struct Tally {
    accepted: usize,
    rejected: usize,
    ignored: usize,
    skipped: usize,
    abandoned: usize,
}

impl DecodeCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        let images = list_images(&self.input)?;
        if images.is_empty() {
            bail!("No .tga images found in {}", self.input.display());
        }

        let output_dir = self
            .output_dir
            .clone()
            .unwrap_or_else(|| config.decoder.output_dir.clone());
        ensure_dir(&output_dir)?;

        let factory = FileSinkFactory::new(&output_dir, &config.decoder.extension);
        let mut assembler =
            FrameAssembler::with_thresholds(config.geometry, config.classifier, factory)
                .context("Failed to create frame assembler")?;

        info!("Decoding {} images from {}", images.len(), self.input.display());

        let mut tally = Tally::default();
        let mut completed = Vec::new();
        for path in &images {
            let frame = match read_targa(path) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Skipping {}: {:#}", path.display(), e);
                    tally.skipped += 1;
                    continue;
                }
            };
            if let Err(e) = check_frame_size(&frame, &config.geometry) {
                warn!("Skipping {}: {}", path.display(), e);
                tally.skipped += 1;
                continue;
            }

            let outcome = match assembler.process_frame(&frame) {
                Ok(outcome) => outcome,
                Err(PxitError::Sink(e)) => {
                    error!("Transfer abandoned at {}: {}", path.display(), e);
                    tally.abandoned += 1;
                    continue;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to decode {}", path.display()))
                }
            };
            match outcome {
                FrameOutcome::BlockAccepted => tally.accepted += 1,
                FrameOutcome::Ignored => tally.ignored += 1,
                FrameOutcome::ChecksumFailedMidStream => {
                    debug!("Checksum failed: {}", path.display());
                    tally.rejected += 1;
                }
                FrameOutcome::TransferComplete(output) => {
                    tally.accepted += 1;
                    println!("✅ File transfer complete: {}", output.display());
                    completed.push(output);
                }
            }
        }

        info!(
            "{} images: {} blocks accepted, {} rejected, {} ignored, {} skipped, {} transfers abandoned",
            images.len(),
            tally.accepted,
            tally.rejected,
            tally.ignored,
            tally.skipped,
            tally.abandoned
        );

        if let Some(session) = assembler.session().filter(|s| !s.is_complete()) {
            warn!(
                "Transfer of {} bytes is incomplete: {} of {} blocks missing",
                session.file_length(),
                session.block_count() - session.received_count(),
                session.block_count()
            );
        }

        if completed.is_empty() {
            bail!("No complete file recovered from {}", self.input.display());
        }
        Ok(())
    }
}
