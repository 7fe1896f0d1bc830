//! Producer side: file bytes to a sequence of painted frames.

use crate::checksum::Checksum;
use crate::geometry::Geometry;
use crate::packet::{Packet, PacketHeader};
use crate::raster::{paint_symbols, PixelBuffer};
use crate::symbol::bytes_to_symbols;
use crate::{PxitError, Result};

/// Paints a packet as a frame.
pub fn packet_frame(geometry: &Geometry, packet: &Packet) -> PixelBuffer {
    paint_symbols(geometry, &bytes_to_symbols(packet.as_bytes()))
}

/// Iterator over the frames that carry a file, one per block, in order.
///
/// # Examples
/// ```
/// use pxit_core::{FrameEncoder, Geometry};
///
/// let encoder = FrameEncoder::new(Geometry::default(), b"Hello world!").unwrap();
/// assert_eq!(encoder.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct FrameEncoder<'a> {
    geometry: Geometry,
    checksum: Checksum,
    data: &'a [u8],
    next_block: usize,
    blocks: usize,
}

impl<'a> FrameEncoder<'a> {
    /// Prepares to encode `data`.
    ///
    /// # Errors
    /// * `PxitError::InvalidGeometry` - the geometry is inconsistent
    /// * `PxitError::EmptyInput` - there is nothing to send
    /// * `PxitError::FileTooLarge` - the length does not fit in 3 bytes
    /// * `PxitError::TooManyBlocks` - the sequence number would overflow
    pub fn new(geometry: Geometry, data: &'a [u8]) -> Result<Self> {
        geometry.validate()?;

        if data.is_empty() {
            return Err(PxitError::EmptyInput);
        }
        if data.len() > geometry.max_file_length() {
            return Err(PxitError::FileTooLarge {
                len: data.len(),
                max: geometry.max_file_length(),
            });
        }
        let blocks = geometry.blocks_needed(data.len());
        if blocks > geometry.max_blocks() {
            return Err(PxitError::TooManyBlocks {
                blocks,
                max: geometry.max_blocks(),
            });
        }

        Ok(Self {
            geometry,
            checksum: Checksum::new(),
            data,
            next_block: 0,
            blocks,
        })
    }

    /// Total number of blocks (and frames) for the file.
    pub fn blocks(&self) -> usize {
        self.blocks
    }

    /// Builds the packet for block `sequence`.
    ///
    /// # Panics
    /// Panics if `sequence` is not below [`blocks`](Self::blocks).
    pub fn packet(&self, sequence: usize) -> Packet {
        assert!(sequence < self.blocks, "block {sequence} out of range");

        let payload_size = self.geometry.payload_size();
        let start = sequence * payload_size;
        let end = (start + payload_size).min(self.data.len());
        let header = PacketHeader {
            file_length: self.data.len(),
            sequence: sequence as u16,
        };

        Packet::build(&self.geometry, header, &self.data[start..end], &self.checksum)
    }

    /// All packets of the file, in order.
    pub fn packets(&self) -> impl Iterator<Item = Packet> + '_ {
        (0..self.blocks).map(|sequence| self.packet(sequence))
    }
}

impl Iterator for FrameEncoder<'_> {
    type Item = PixelBuffer;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_block >= self.blocks {
            return None;
        }
        let packet = self.packet(self.next_block);
        self.next_block += 1;
        Some(packet_frame(&self.geometry, &packet))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.blocks - self.next_block;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FrameEncoder<'_> {}
