//! Live capture plumbing.
//!
//! A [`FrameSource`] produces complete RGB frames; [`CaptureHandoff`] runs it
//! on its own thread and hands each finished frame to the consumer over a
//! bounded channel, so the assembler never sees a buffer that is still being
//! filled. [`YuyvReader`] is a source for raw packed YUYV video.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, never, Receiver, RecvTimeoutError};
use log::{debug, error, warn};

use crate::raster::{PixelBuffer, Rgb};
use crate::{PxitError, Result};

/// Something that yields frames until it runs dry.
pub trait FrameSource {
    fn start(&mut self) -> io::Result<()>;

    /// Blocks until the next complete frame is available. Returns `None`
    /// at the end of the stream.
    fn next_frame(&mut self) -> io::Result<Option<PixelBuffer>>;

    fn stop(&mut self) -> io::Result<()>;
}

/// A flag an operator can raise from any thread to request a diagnostic
/// snapshot of the next frame.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticFlag(Arc<AtomicBool>);

impl DiagnosticFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clears the flag, returning whether it was raised.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Runs a [`FrameSource`] on a background thread.
pub struct CaptureHandoff {
    receiver: Receiver<PixelBuffer>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<io::Result<()>>>,
}

impl CaptureHandoff {
    /// Starts `source` on a new thread. At most `capacity` frames are
    /// buffered before the capture thread waits for the consumer.
    pub fn spawn<S>(mut source: S, capacity: usize) -> io::Result<Self>
    where
        S: FrameSource + Send + 'static,
    {
        let (sender, receiver) = bounded(capacity);
        let running = Arc::new(AtomicBool::new(true));
        let keep_running = Arc::clone(&running);

        let worker = thread::Builder::new()
            .name("pxit-capture".to_string())
            .spawn(move || -> io::Result<()> {
                source.start()?;
                let result = loop {
                    if !keep_running.load(Ordering::Acquire) {
                        break Ok(());
                    }
                    match source.next_frame() {
                        Ok(Some(frame)) => {
                            if sender.send(frame).is_err() {
                                break Ok(());
                            }
                        }
                        Ok(None) => {
                            debug!("Capture source reached end of stream");
                            break Ok(());
                        }
                        Err(e) => {
                            error!("Capture failed: {}", e);
                            break Err(e);
                        }
                    }
                };
                let stopped = source.stop();
                result.and(stopped)
            })?;

        Ok(Self {
            receiver,
            running,
            worker: Some(worker),
        })
    }

    /// Waits for the next frame.
    ///
    /// # Errors
    /// Returns `PxitError::CaptureClosed` once the source has stopped and
    /// every buffered frame has been delivered.
    pub fn recv(&self) -> Result<PixelBuffer> {
        self.receiver.recv().map_err(|_| PxitError::CaptureClosed)
    }

    /// Like [`recv`](Self::recv), but gives up after `timeout`.
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Result<Option<PixelBuffer>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(PxitError::CaptureClosed),
        }
    }

    /// Blocking iterator over frames until the source stops.
    pub fn frames(&self) -> impl Iterator<Item = PixelBuffer> + '_ {
        self.receiver.iter()
    }

    /// Stops the capture thread and reports how the source ended.
    pub fn finish(mut self) -> io::Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.running.store(false, Ordering::Release);
        // Unblocks a capture thread waiting on a full channel
        self.receiver = never();
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| io::Error::other("capture thread panicked"))?,
            None => Ok(()),
        }
    }
}

impl Drop for CaptureHandoff {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Capture ended with an error: {}", e);
        }
    }
}

impl std::fmt::Debug for CaptureHandoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureHandoff")
            .field("running", &self.running.load(Ordering::Relaxed))
            .field("buffered", &self.receiver.len())
            .finish()
    }
}

/// Converts one packed YUYV (4:2:2) frame to RGB.
///
/// # Errors
/// Returns `PxitError::FrameSize` if `yuyv` is not exactly two bytes per
/// pixel.
pub fn yuyv_to_rgb(yuyv: &[u8], width: usize, height: usize) -> Result<PixelBuffer> {
    if yuyv.len() != width * height * 2 {
        return Err(PxitError::FrameSize {
            expected: width * height,
            actual: yuyv.len() / 2,
        });
    }
    let mut pixels = Vec::with_capacity(width * height);
    convert_yuyv(yuyv, &mut pixels);
    PixelBuffer::from_pixels(width, height, pixels)
}

fn convert_yuyv(yuyv: &[u8], pixels: &mut Vec<u32>) {
    pixels.clear();
    let count = yuyv.len() / 2;
    for z in 0..count {
        let y = 2 * z;
        // Each pair of pixels shares one U and one V sample: Y0 U Y1 V
        let (u, v) = if z & 1 == 1 {
            (yuyv[y - 1], yuyv[y + 1])
        } else {
            (yuyv[y + 1], yuyv.get(y + 3).copied().unwrap_or(128))
        };
        pixels.push(bt601(yuyv[y], u, v).to_argb());
    }
}

/// Integer BT.601 conversion for studio-swing YUV.
fn bt601(y: u8, u: u8, v: u8) -> Rgb {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let clamp = |value: i32| value.clamp(0, 255) as u8;
    Rgb {
        red: clamp((298 * c + 409 * e + 128) >> 8),
        green: clamp((298 * c - 100 * d - 208 * e + 128) >> 8),
        blue: clamp((298 * c + 516 * d + 128) >> 8),
    }
}

/// Reads raw YUYV frames of a fixed size from a byte stream.
pub struct YuyvReader<R> {
    reader: R,
    width: usize,
    height: usize,
    buffer: Vec<u8>,
}

impl<R: Read> YuyvReader<R> {
    pub fn new(reader: R, width: usize, height: usize) -> Self {
        Self {
            reader,
            width,
            height,
            buffer: vec![0; width * height * 2],
        }
    }

    /// Fills the frame buffer. Returns the number of bytes read, which is
    /// short only at the end of the stream.
    fn fill(&mut self) -> io::Result<usize> {
        let mut filled = 0;
        while filled < self.buffer.len() {
            match self.reader.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> FrameSource for YuyvReader<R> {
    fn start(&mut self) -> io::Result<()> {
        debug!(
            "Reading {}x{} YUYV frames ({} bytes each)",
            self.width,
            self.height,
            self.buffer.len()
        );
        Ok(())
    }

    fn next_frame(&mut self) -> io::Result<Option<PixelBuffer>> {
        let filled = self.fill()?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < self.buffer.len() {
            warn!(
                "Discarding truncated frame ({} of {} bytes)",
                filled,
                self.buffer.len()
            );
            return Ok(None);
        }

        let mut pixels = Vec::with_capacity(self.width * self.height);
        convert_yuyv(&self.buffer, &mut pixels);
        PixelBuffer::from_pixels(self.width, self.height, pixels)
            .map(Some)
            .map_err(io::Error::other)
    }

    fn stop(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<R> std::fmt::Debug for YuyvReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YuyvReader")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}
