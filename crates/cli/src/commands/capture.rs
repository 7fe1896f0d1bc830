//! Capture command implementation

use anyhow::{Context, Result};
use clap::Args;
use log::{debug, error, info, warn};
use pxit_core::raster::mark_sample_points;
use pxit_core::{
    AssemblerState, BlockSink, CaptureHandoff, DiagnosticFlag, FrameAssembler, FrameOutcome,
    Geometry, PixelBuffer, PxitError, SinkFactory, YuyvReader,
};
use std::fs::File;
use std::io::{self, BufRead, Read};
use std::path::{Path, PathBuf};
use std::thread;

use super::decode::FileSinkFactory;
use crate::config::Config;
use crate::formats::{write_targa, ImageDepth};
use crate::utils::ensure_dir;

#[derive(Args)]
pub struct CaptureCommand {
    /// Raw YUYV stream at the configured image size (use '-' for stdin)
    #[arg(value_name = "STREAM")]
    pub input: String,

    /// Output directory for reassembled files
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory for diagnostic snapshots (defaults to the output directory)
    #[arg(long, value_name = "DIR")]
    pub dump_dir: Option<PathBuf>,

    /// Frames buffered between the capture thread and the decoder
    #[arg(long, value_name = "FRAMES", default_value_t = 4)]
    pub buffer: usize,

    /// Stop after the first completed transfer
    #[arg(long)]
    pub once: bool,
}

impl CaptureCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        let geometry = config.geometry;
        let output_dir = self
            .output_dir
            .clone()
            .unwrap_or_else(|| config.decoder.output_dir.clone());
        ensure_dir(&output_dir)?;
        let dump_dir = self.dump_dir.clone().unwrap_or_else(|| output_dir.clone());
        ensure_dir(&dump_dir)?;

        let stream: Box<dyn Read + Send> = if self.input == "-" {
            Box::new(io::stdin())
        } else {
            Box::new(
                File::open(&self.input)
                    .with_context(|| format!("Failed to open stream: {}", self.input))?,
            )
        };
        let source = YuyvReader::new(stream, geometry.width, geometry.height);
        let handoff =
            CaptureHandoff::spawn(source, self.buffer).context("Failed to start capture")?;

        let flag = DiagnosticFlag::new();
        if self.input != "-" {
            watch_operator(flag.clone());
            info!("Press Enter to save a diagnostic snapshot");
        }

        let factory = FileSinkFactory::new(&output_dir, &config.decoder.extension);
        let mut assembler = FrameAssembler::with_thresholds(geometry, config.classifier, factory)
            .context("Failed to create frame assembler")?;

        let summary = decode_stream(
            handoff.frames(),
            &mut assembler,
            &flag,
            &dump_dir,
            self.once,
        )?;

        handoff.finish().context("Capture stream failed")?;
        info!(
            "Capture ended after {} frames: {} files, {} abandoned, {} snapshots",
            summary.frames,
            summary.completed.len(),
            summary.abandoned,
            summary.snapshots
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CaptureSummary {
    frames: usize,
    completed: Vec<PathBuf>,
    abandoned: usize,
    snapshots: usize,
}

/// Allows one checksum-failure snapshot per transfer, and only while it is
/// still receiving. Once a transfer completes, failures mark the sender
/// going quiet.
#[derive(Debug, Default)]
struct FailureSnapshots {
    taken_for: Option<usize>,
}

impl FailureSnapshots {
    fn should_take(&mut self, state: AssemblerState, file_length: Option<usize>) -> bool {
        if state != AssemblerState::Receiving || file_length == self.taken_for {
            return false;
        }
        self.taken_for = file_length;
        true
    }

    fn transfer_complete(&mut self) {
        self.taken_for = None;
    }
}

/// Runs captured frames through the assembler until the stream ends.
///
/// A failing output sink abandons only the transfer it belonged to; the
/// assembler picks up the next transfer when the file length changes.
fn decode_stream<F>(
    frames: impl IntoIterator<Item = PixelBuffer>,
    assembler: &mut FrameAssembler<F>,
    flag: &DiagnosticFlag,
    dump_dir: &Path,
    once: bool,
) -> Result<CaptureSummary>
where
    F: SinkFactory,
    F::Sink: BlockSink<Output = PathBuf>,
{
    let geometry = *assembler.sampler().geometry();
    let mut summary = CaptureSummary::default();
    let mut failures = FailureSnapshots::default();

    for frame in frames {
        summary.frames += 1;
        match assembler.process_frame(&frame) {
            Ok(FrameOutcome::ChecksumFailedMidStream) => {
                let file_length = assembler.session().map(|s| s.file_length());
                if failures.should_take(assembler.state(), file_length) {
                    warn!("Checksum failed mid-stream at frame {}", summary.frames);
                    summary.snapshots += 1;
                    save_snapshot(
                        &geometry,
                        &frame,
                        dump_dir,
                        "checksum-failure",
                        summary.snapshots,
                    )?;
                } else {
                    debug!("Checksum failed at frame {}", summary.frames);
                }
            }
            Ok(FrameOutcome::TransferComplete(path)) => {
                println!("✅ File transfer complete: {}", path.display());
                failures.transfer_complete();
                summary.completed.push(path);
                if once {
                    break;
                }
            }
            Ok(FrameOutcome::BlockAccepted | FrameOutcome::Ignored) => {}
            Err(PxitError::Sink(e)) => {
                error!("Transfer abandoned at frame {}: {}", summary.frames, e);
                summary.abandoned += 1;
            }
            Err(e) => return Err(e.into()),
        }

        if flag.take() {
            summary.snapshots += 1;
            save_snapshot(&geometry, &frame, dump_dir, "diagnostic", summary.snapshots)?;
        }
    }

    Ok(summary)
}

/// Raises `flag` for every line the operator types.
fn watch_operator(flag: DiagnosticFlag) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            if line.is_err() {
                break;
            }
            flag.raise();
        }
    });
}

fn save_snapshot(
    geometry: &Geometry,
    frame: &PixelBuffer,
    dir: &Path,
    label: &str,
    index: usize,
) -> Result<()> {
    let mut annotated = frame.clone();
    mark_sample_points(geometry, &mut annotated);

    let path = dir.join(format!("{}-{:04}.tga", label, index));
    write_targa(&path, &annotated, ImageDepth::Bgra32)?;
    debug!("Saved snapshot {}", path.display());
    println!("Saved diagnostic frame: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::decode::FileSink;
    use pxit_core::{FrameEncoder, ThreadedSink};
    use std::fs;
    use tempfile::TempDir;

    fn sample_file(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    fn frames(data: &[u8]) -> Vec<PixelBuffer> {
        FrameEncoder::new(Geometry::default(), data).unwrap().collect()
    }

    fn blank() -> PixelBuffer {
        PixelBuffer::new(720, 480)
    }

    fn file_assembler(dir: &Path) -> FrameAssembler<FileSinkFactory> {
        FrameAssembler::new(Geometry::default(), FileSinkFactory::new(dir, "bin")).unwrap()
    }

    fn snapshots(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tga"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_blank_frames_after_completion_are_not_dumped() {
        let dir = TempDir::new().unwrap();
        let data = sample_file(900);
        let mut stream = frames(&data);
        stream.extend(std::iter::repeat_with(blank).take(50));

        let mut assembler = file_assembler(dir.path());
        let summary = decode_stream(
            stream,
            &mut assembler,
            &DiagnosticFlag::new(),
            dir.path(),
            false,
        )
        .unwrap();

        assert_eq!(summary.frames, 53);
        assert_eq!(summary.completed.len(), 1);
        assert_eq!(fs::read(&summary.completed[0]).unwrap(), data);
        assert_eq!(summary.snapshots, 0);
        assert!(snapshots(dir.path()).is_empty());
    }

    #[test]
    fn test_one_snapshot_per_interrupted_transfer() {
        let dir = TempDir::new().unwrap();
        let data = sample_file(900);
        let encoded = frames(&data);
        let stream = vec![
            encoded[0].clone(),
            blank(),
            blank(),
            blank(),
            encoded[1].clone(),
            blank(),
            encoded[2].clone(),
        ];

        let mut assembler = file_assembler(dir.path());
        let summary = decode_stream(
            stream,
            &mut assembler,
            &DiagnosticFlag::new(),
            dir.path(),
            false,
        )
        .unwrap();

        assert_eq!(summary.completed.len(), 1);
        assert_eq!(summary.snapshots, 1);
        assert_eq!(snapshots(dir.path()), vec!["checksum-failure-0001.tga"]);
    }

    #[test]
    fn test_raised_flag_saves_diagnostic_frame() {
        let dir = TempDir::new().unwrap();
        let flag = DiagnosticFlag::new();
        flag.raise();

        let mut assembler = file_assembler(dir.path());
        let summary =
            decode_stream(vec![blank(), blank()], &mut assembler, &flag, dir.path(), false)
                .unwrap();

        assert_eq!(summary.snapshots, 1);
        assert_eq!(snapshots(dir.path()), vec!["diagnostic-0001.tga"]);
    }

    /// Fails to open the first output, then behaves like the file factory.
    struct FailFirstOpen {
        inner: FileSinkFactory,
        failed: bool,
    }

    impl SinkFactory for FailFirstOpen {
        type Sink = ThreadedSink<FileSink>;

        fn open(&mut self, file_length: usize) -> std::io::Result<Self::Sink> {
            if !self.failed {
                self.failed = true;
                return Err(std::io::Error::other("disk full"));
            }
            self.inner.open(file_length)
        }
    }

    #[test]
    fn test_sink_failure_abandons_only_its_transfer() {
        let dir = TempDir::new().unwrap();
        let first = sample_file(900);
        let second = sample_file(1200);
        let mut stream = frames(&first);
        stream.extend(frames(&second));

        let factory = FailFirstOpen {
            inner: FileSinkFactory::new(dir.path(), "bin"),
            failed: false,
        };
        let mut assembler = FrameAssembler::new(Geometry::default(), factory).unwrap();
        let summary = decode_stream(
            stream,
            &mut assembler,
            &DiagnosticFlag::new(),
            dir.path(),
            false,
        )
        .unwrap();

        assert_eq!(summary.abandoned, 1);
        assert_eq!(summary.completed.len(), 1);
        assert_eq!(fs::read(&summary.completed[0]).unwrap(), second);
        assert_eq!(assembler.state(), AssemblerState::Complete);
    }

    #[test]
    fn test_once_stops_after_first_file() {
        let dir = TempDir::new().unwrap();
        let mut stream = frames(&sample_file(100));
        stream.extend(frames(&sample_file(200)));

        let mut assembler = file_assembler(dir.path());
        let summary = decode_stream(
            stream,
            &mut assembler,
            &DiagnosticFlag::new(),
            dir.path(),
            true,
        )
        .unwrap();

        assert_eq!(summary.frames, 1);
        assert_eq!(summary.completed.len(), 1);
    }
}
