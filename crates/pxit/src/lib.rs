//! File transfer over sequences of four-colored still images.
//!
//! A file is cut into fixed-size packets, each protected by a 4-byte GF(256)
//! polynomial checksum and painted as a grid of red, white, blue and green
//! cells. The receiving side samples one pixel per cell, rebuilds the packet,
//! verifies it, and reassembles the file from whatever frames arrive, in any
//! order and with any amount of loss or repetition.
//!
//! ```
//! use pxit_core::{FrameAssembler, FrameEncoder, FrameOutcome, Geometry, MemorySinkFactory};
//!
//! let geometry = Geometry::default();
//! let file: Vec<u8> = (0..1000u32).map(|i| (i * 7) as u8).collect();
//!
//! let frames: Vec<_> = FrameEncoder::new(geometry, &file).unwrap().collect();
//! assert_eq!(frames.len(), 4);
//!
//! let mut assembler = FrameAssembler::new(geometry, MemorySinkFactory).unwrap();
//! let mut received = None;
//! for frame in frames.iter().rev() {
//!     if let FrameOutcome::TransferComplete(bytes) = assembler.process_frame(frame).unwrap() {
//!         received = Some(bytes);
//!     }
//! }
//! assert_eq!(received.unwrap(), file);
//! ```

pub mod assembler;
pub mod capture;
pub mod checksum;
pub mod encoder;
pub mod geometry;
pub mod gf256;
pub mod packet;
pub mod raster;
pub mod sampler;
pub mod sink;
pub mod symbol;

pub use assembler::{AssemblerState, FrameAssembler, FrameOutcome, TransferSession};
pub use capture::{yuyv_to_rgb, CaptureHandoff, DiagnosticFlag, FrameSource, YuyvReader};
pub use checksum::Checksum;
pub use encoder::FrameEncoder;
pub use geometry::Geometry;
pub use packet::{Packet, PacketHeader};
pub use raster::PixelBuffer;
pub use sampler::{Classification, ColorSampler, Thresholds};
pub use sink::{BlockSink, MemorySinkFactory, SinkFactory, ThreadedSink};
pub use symbol::{CellColor, Symbol};

use thiserror::Error;

/// Errors that can occur while encoding or reassembling a transfer.
///
/// Expected channel noise (bad checksums, unreadable cells) is not an error;
/// it is reported through [`FrameOutcome`].
#[derive(Debug, Error)]
pub enum PxitError {
    /// Grid or packet geometry is inconsistent
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// File does not fit the 3-byte length field
    #[error("File of {len} bytes exceeds the maximum of {max} bytes")]
    FileTooLarge { len: usize, max: usize },

    /// File needs more blocks than the 2-byte sequence field can address
    #[error("File needs {blocks} blocks but at most {max} can be addressed")]
    TooManyBlocks { blocks: usize, max: usize },

    /// Empty input provided
    #[error("Cannot encode an empty file")]
    EmptyInput,

    /// Pixel buffer does not match the configured image size
    #[error("Pixel buffer holds {actual} pixels, expected {expected}")]
    FrameSize { expected: usize, actual: usize },

    /// The output sink could not be opened, written or closed
    #[error("Output sink failed: {0}")]
    Sink(#[from] std::io::Error),

    /// The capture thread stopped delivering frames
    #[error("Capture source closed")]
    CaptureClosed,
}

pub type Result<T> = std::result::Result<T, PxitError>;
