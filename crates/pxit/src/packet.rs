//! Packet layout.
//!
//! ```text
//! +---------------------+  0
//! | file length (3, BE) |
//! +---------------------+  3
//! | sequence (2, BE)    |
//! +---------------------+  5
//! | payload             |  packet_size - 9 bytes, zero padded
//! +---------------------+  packet_size - 4
//! | checksum (4)        |
//! +---------------------+  packet_size
//! ```

use crate::checksum::Checksum;
use crate::geometry::{Geometry, CHECKSUM_SIZE, FILE_LENGTH_BYTES, HEADER_SIZE};

/// The fixed fields at the front of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketHeader {
    /// Length of the whole file being transferred
    pub file_length: usize,
    /// Index of the block carried by this packet
    pub sequence: u16,
}

impl PacketHeader {
    /// Decodes the header from the first five bytes of `bytes`.
    pub fn read(bytes: &[u8]) -> Self {
        let file_length = bytes[..FILE_LENGTH_BYTES]
            .iter()
            .fold(0usize, |len, &byte| (len << 8) | byte as usize);
        let sequence = u16::from_be_bytes([bytes[3], bytes[4]]);
        Self {
            file_length,
            sequence,
        }
    }

    /// Encodes the header into the first five bytes of `bytes`.
    ///
    /// Only the low 24 bits of the file length are representable.
    pub fn write(&self, bytes: &mut [u8]) {
        let length = (self.file_length as u32).to_be_bytes();
        bytes[..FILE_LENGTH_BYTES].copy_from_slice(&length[1..]);
        bytes[FILE_LENGTH_BYTES..HEADER_SIZE].copy_from_slice(&self.sequence.to_be_bytes());
    }
}

/// One packet of the transfer protocol, header and checksum included.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    bytes: Vec<u8>,
}

impl Packet {
    /// Assembles a checksummed packet for one block of a file.
    ///
    /// A short final block is padded with zeros. `payload` must not exceed
    /// `geometry.payload_size()`.
    pub fn build(
        geometry: &Geometry,
        header: PacketHeader,
        payload: &[u8],
        checksum: &Checksum,
    ) -> Self {
        debug_assert!(payload.len() <= geometry.payload_size());

        let mut bytes = vec![0u8; geometry.packet_size];
        header.write(&mut bytes);
        bytes[HEADER_SIZE..HEADER_SIZE + payload.len()].copy_from_slice(payload);
        checksum.compute(&mut bytes);

        Self { bytes }
    }

    /// Wraps raw packet bytes read off a frame.
    ///
    /// Returns `None` if `bytes` is too short to hold a header, a payload
    /// byte and a checksum.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        if bytes.len() <= HEADER_SIZE + CHECKSUM_SIZE {
            return None;
        }
        Some(Self { bytes })
    }

    /// Decodes the header fields.
    pub fn header(&self) -> PacketHeader {
        PacketHeader::read(&self.bytes)
    }

    /// The payload region, padding included.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[HEADER_SIZE..self.checksum_offset()]
    }

    /// The stored checksum bytes.
    pub fn checksum(&self) -> &[u8] {
        &self.bytes[self.checksum_offset()..]
    }

    /// Returns true if the stored checksum matches the contents.
    pub fn verify(&self, checksum: &Checksum) -> bool {
        checksum.verify(&self.bytes)
    }

    /// The complete packet.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the packet, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    fn checksum_offset(&self) -> usize {
        self.bytes.len() - CHECKSUM_SIZE
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("header", &self.header())
            .field("len", &self.bytes.len())
            .field("checksum", &self.checksum())
            .finish()
    }
}
