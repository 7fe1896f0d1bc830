//! Image and packet geometry shared by encoder and decoder.
//!
//! Both sides must agree on every field here; a mismatch is a configuration
//! error and is rejected by [`Geometry::validate`] before any frame is touched.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{PxitError, Result};

/// Bytes of the big-endian file length field.
pub const FILE_LENGTH_BYTES: usize = 3;
/// Bytes of the big-endian block sequence field.
pub const SEQUENCE_BYTES: usize = 2;
/// Packet header size: file length followed by sequence number.
pub const HEADER_SIZE: usize = FILE_LENGTH_BYTES + SEQUENCE_BYTES;
/// Checksum size: the remainder of division by a degree-4 polynomial.
pub const CHECKSUM_SIZE: usize = 4;
/// Each cell carries two bits.
pub const SYMBOLS_PER_BYTE: usize = 4;

/// Pixel grid and packet layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct Geometry {
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
    /// Side of a square cell in pixels
    pub cell_size: usize,
    /// Total packet size in bytes, header and checksum included
    pub packet_size: usize,
    /// Header size in bytes
    pub header_size: usize,
    /// Checksum size in bytes
    pub checksum_size: usize,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            width: 720,
            height: 480,
            cell_size: 16,
            packet_size: 337,
            header_size: HEADER_SIZE,
            checksum_size: CHECKSUM_SIZE,
        }
    }
}

impl Geometry {
    /// Checks that the grid tiles the image and can carry a whole packet.
    ///
    /// # Errors
    /// Returns `PxitError::InvalidGeometry` describing the first violation.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PxitError::InvalidGeometry(msg));

        if self.width == 0 || self.height == 0 || self.cell_size == 0 {
            return invalid("image and cell dimensions must be non-zero".into());
        }
        if self.width % self.cell_size != 0 || self.height % self.cell_size != 0 {
            return invalid(format!(
                "{}x{} image is not tiled by {}px cells",
                self.width, self.height, self.cell_size
            ));
        }
        if self.header_size != HEADER_SIZE {
            return invalid(format!(
                "header must be {} bytes, got {}",
                HEADER_SIZE, self.header_size
            ));
        }
        if self.checksum_size != CHECKSUM_SIZE {
            return invalid(format!(
                "checksum must be {} bytes, got {}",
                CHECKSUM_SIZE, self.checksum_size
            ));
        }
        if self.packet_size <= self.header_size + self.checksum_size {
            return invalid(format!(
                "packet of {} bytes leaves no room for payload",
                self.packet_size
            ));
        }
        if self.symbols_per_packet() > self.cells() {
            return invalid(format!(
                "packet needs {} cells but the grid has {}",
                self.symbols_per_packet(),
                self.cells()
            ));
        }
        Ok(())
    }

    /// Number of cell columns.
    pub fn columns(&self) -> usize {
        self.width / self.cell_size
    }

    /// Number of cell rows.
    pub fn rows(&self) -> usize {
        self.height / self.cell_size
    }

    /// Total number of cells in the grid.
    pub fn cells(&self) -> usize {
        self.columns() * self.rows()
    }

    /// Number of pixels in one frame.
    pub fn pixels(&self) -> usize {
        self.width * self.height
    }

    /// Cells needed to carry one packet.
    pub fn symbols_per_packet(&self) -> usize {
        self.packet_size * SYMBOLS_PER_BYTE
    }

    /// Trailing cells that carry no packet data.
    ///
    /// With the default 45x30 grid and 337-byte packets the grid offers 2700
    /// bits for 2696 bits of packet, leaving two cells. They are painted with
    /// the padding symbol and never read back.
    pub fn slack_cells(&self) -> usize {
        self.cells() - self.symbols_per_packet()
    }

    /// File bytes carried by each packet.
    pub fn payload_size(&self) -> usize {
        self.packet_size - self.header_size - self.checksum_size
    }

    /// Byte offset of the checksum field.
    pub fn checksum_offset(&self) -> usize {
        self.packet_size - self.checksum_size
    }

    /// Largest file length the header can express.
    pub fn max_file_length(&self) -> usize {
        (1 << (8 * FILE_LENGTH_BYTES)) - 1
    }

    /// Largest number of blocks the sequence field can address.
    pub fn max_blocks(&self) -> usize {
        1 << (8 * SEQUENCE_BYTES)
    }

    /// Number of blocks needed for a file of `file_length` bytes.
    pub fn blocks_needed(&self, file_length: usize) -> usize {
        file_length.div_ceil(self.payload_size())
    }

    /// Payload bytes carried by the final block of a `file_length` byte file.
    pub fn last_block_size(&self, file_length: usize) -> usize {
        match file_length % self.payload_size() {
            0 => self.payload_size(),
            partial => partial,
        }
    }

    /// Pixel coordinates of the representative pixel for `cell`.
    pub fn sample_point(&self, cell: usize) -> (usize, usize) {
        let row = cell / self.columns();
        let col = cell % self.columns();
        let half = self.cell_size / 2;
        (col * self.cell_size + half, row * self.cell_size + half)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry_is_valid() {
        let geometry = Geometry::default();
        geometry.validate().unwrap();

        assert_eq!(geometry.columns(), 45);
        assert_eq!(geometry.rows(), 30);
        assert_eq!(geometry.cells(), 1350);
        assert_eq!(geometry.payload_size(), 328);
        assert_eq!(geometry.checksum_offset(), 333);
    }

    #[test]
    fn test_grid_capacity_slack() {
        let geometry = Geometry::default();

        // 2700 bits of capacity against 2696 bits of packet
        assert_eq!(geometry.cells() * 2, 2700);
        assert_eq!(geometry.packet_size * 8, 2696);
        assert_eq!(geometry.slack_cells(), 2);
    }

    #[test]
    fn test_packet_larger_than_grid_is_rejected() {
        let geometry = Geometry {
            packet_size: 338,
            ..Geometry::default()
        };
        assert!(matches!(
            geometry.validate(),
            Err(PxitError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_untiled_image_is_rejected() {
        let geometry = Geometry {
            width: 721,
            ..Geometry::default()
        };
        assert!(geometry.validate().is_err());
    }

    #[test]
    fn test_header_and_checksum_sizes_are_fixed() {
        let header = Geometry {
            header_size: 6,
            ..Geometry::default()
        };
        let checksum = Geometry {
            checksum_size: 2,
            ..Geometry::default()
        };
        assert!(header.validate().is_err());
        assert!(checksum.validate().is_err());
    }

    #[test]
    fn test_packet_without_payload_is_rejected() {
        let geometry = Geometry {
            packet_size: 9,
            ..Geometry::default()
        };
        assert!(geometry.validate().is_err());
    }

    #[test]
    fn test_block_arithmetic() {
        let geometry = Geometry::default();

        assert_eq!(geometry.blocks_needed(1000), 4);
        assert_eq!(geometry.last_block_size(1000), 16);

        assert_eq!(geometry.blocks_needed(656), 2);
        assert_eq!(geometry.last_block_size(656), 328);

        assert_eq!(geometry.blocks_needed(1), 1);
        assert_eq!(geometry.last_block_size(1), 1);
    }

    #[test]
    fn test_header_limits() {
        let geometry = Geometry::default();
        assert_eq!(geometry.max_file_length(), 16_777_215);
        assert_eq!(geometry.max_blocks(), 65_536);
    }

    #[test]
    fn test_sample_points_are_cell_centers() {
        let geometry = Geometry::default();
        assert_eq!(geometry.sample_point(0), (8, 8));
        assert_eq!(geometry.sample_point(1), (24, 8));
        assert_eq!(geometry.sample_point(45), (8, 24));
        assert_eq!(geometry.sample_point(1349), (712, 472));
    }
}
