//! Targa image container
//!
//! Frames are stored as uncompressed true-color Targa files (image type 2).
//! Run-length encoded true-color files (image type 10), as written by many
//! capture tools, are accepted on input.

use anyhow::{Context, Result};
use clap::ValueEnum;
use pxit_core::PixelBuffer;
use std::fs;
use std::path::Path;

use crate::error::CliError;

const HEADER_LEN: usize = 18;
const TYPE_TRUE_COLOR: u8 = 2;
const TYPE_RLE_TRUE_COLOR: u8 = 10;
/// Image descriptor bit for a top-left origin
const TOP_LEFT_ORIGIN: u8 = 0x20;
const OPAQUE: u32 = 0xFF00_0000;
/// Pixels covered by one run-length packet at most
const RLE_MAX_RUN: usize = 128;

/// Bits per pixel of written images.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageDepth {
    /// 32-bit BGRA
    #[value(name = "32")]
    Bgra32,
    /// 24-bit BGR
    #[value(name = "24")]
    Bgr24,
}

impl ImageDepth {
    pub fn from_bits(bits: u8) -> std::result::Result<Self, CliError> {
        match bits {
            32 => Ok(Self::Bgra32),
            24 => Ok(Self::Bgr24),
            other => Err(CliError::UnsupportedDepth(other)),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::Bgra32 => 32,
            Self::Bgr24 => 24,
        }
    }

    fn bytes_per_pixel(self) -> usize {
        self.bits() as usize / 8
    }
}

/// The fixed 18-byte Targa header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TargaHeader {
    id_len: u8,
    color_map_type: u8,
    image_type: u8,
    color_map_len: u16,
    color_map_entry_bits: u8,
    width: u16,
    height: u16,
    depth: u8,
    descriptor: u8,
}

impl TargaHeader {
    fn parse(bytes: &[u8]) -> std::result::Result<Self, CliError> {
        if bytes.len() < HEADER_LEN {
            return Err(CliError::InvalidImage(format!(
                "{} bytes is too short for a Targa header",
                bytes.len()
            )));
        }
        let word = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        Ok(Self {
            id_len: bytes[0],
            color_map_type: bytes[1],
            image_type: bytes[2],
            color_map_len: word(5),
            color_map_entry_bits: bytes[7],
            width: word(12),
            height: word(14),
            depth: bytes[16],
            descriptor: bytes[17],
        })
    }

    fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0] = self.id_len;
        bytes[1] = self.color_map_type;
        bytes[2] = self.image_type;
        bytes[5..7].copy_from_slice(&self.color_map_len.to_le_bytes());
        bytes[7] = self.color_map_entry_bits;
        bytes[12..14].copy_from_slice(&self.width.to_le_bytes());
        bytes[14..16].copy_from_slice(&self.height.to_le_bytes());
        bytes[16] = self.depth;
        bytes[17] = self.descriptor;
        bytes
    }

    /// Offset of the first pixel byte.
    fn data_offset(&self) -> usize {
        let color_map = self.color_map_len as usize * (self.color_map_entry_bits as usize).div_ceil(8);
        HEADER_LEN + self.id_len as usize + color_map
    }
}

/// Decodes a Targa file into a top-row-first pixel buffer.
pub fn decode_targa(bytes: &[u8]) -> std::result::Result<PixelBuffer, CliError> {
    let header = TargaHeader::parse(bytes)?;
    let depth = ImageDepth::from_bits(header.depth)?;
    let width = header.width as usize;
    let height = header.height as usize;

    let data = bytes.get(header.data_offset()..).ok_or_else(|| {
        CliError::InvalidImage("image data starts past the end of the file".to_string())
    })?;

    let mut pixels = match header.image_type {
        TYPE_TRUE_COLOR => read_raw(data, depth, width * height)?,
        TYPE_RLE_TRUE_COLOR => read_rle(data, depth, width * height)?,
        other => {
            return Err(CliError::InvalidImage(format!(
                "unsupported Targa image type {other}"
            )))
        }
    };

    if header.descriptor & TOP_LEFT_ORIGIN == 0 && width > 0 {
        flip_rows(&mut pixels, width);
    }

    PixelBuffer::from_pixels(width, height, pixels)
        .map_err(|e| CliError::InvalidImage(e.to_string()))
}

/// Encodes a pixel buffer as an uncompressed, top-left origin Targa file.
pub fn encode_targa(frame: &PixelBuffer, depth: ImageDepth) -> std::result::Result<Vec<u8>, CliError> {
    let dimension = |value: usize| {
        u16::try_from(value)
            .map_err(|_| CliError::InvalidImage(format!("dimension {value} exceeds 65535")))
    };
    let header = TargaHeader {
        id_len: 0,
        color_map_type: 0,
        image_type: TYPE_TRUE_COLOR,
        color_map_len: 0,
        color_map_entry_bits: 0,
        width: dimension(frame.width())?,
        height: dimension(frame.height())?,
        depth: depth.bits(),
        descriptor: TOP_LEFT_ORIGIN,
    };

    let mut bytes = Vec::with_capacity(HEADER_LEN + frame.pixels().len() * depth.bytes_per_pixel());
    bytes.extend_from_slice(&header.to_bytes());
    for &pixel in frame.pixels() {
        // Little-endian ARGB is BGRA on disk
        let bgra = pixel.to_le_bytes();
        bytes.extend_from_slice(&bgra[..depth.bytes_per_pixel()]);
    }
    Ok(bytes)
}

pub fn read_targa(path: &Path) -> Result<PixelBuffer> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read image: {}", path.display()))?;
    decode_targa(&bytes).with_context(|| format!("Failed to decode image: {}", path.display()))
}

pub fn write_targa(path: &Path, frame: &PixelBuffer, depth: ImageDepth) -> Result<()> {
    let bytes = encode_targa(frame, depth)?;
    fs::write(path, bytes).with_context(|| format!("Failed to write image: {}", path.display()))
}

/// Alpha is not carried through; every decoded pixel is opaque.
fn pixel_at(bgr: &[u8]) -> u32 {
    OPAQUE | u32::from_le_bytes([bgr[0], bgr[1], bgr[2], 0])
}

fn truncated() -> CliError {
    CliError::InvalidImage("pixel data is truncated".to_string())
}

fn read_raw(data: &[u8], depth: ImageDepth, count: usize) -> std::result::Result<Vec<u32>, CliError> {
    let stride = depth.bytes_per_pixel();
    if data.len() < count * stride {
        return Err(truncated());
    }
    Ok(data
        .chunks_exact(stride)
        .take(count)
        .map(pixel_at)
        .collect())
}

fn read_rle(data: &[u8], depth: ImageDepth, count: usize) -> std::result::Result<Vec<u32>, CliError> {
    let stride = depth.bytes_per_pixel();
    // Every packet spends a count byte and at least one pixel
    if count > data.len() / (1 + stride) * RLE_MAX_RUN {
        return Err(truncated());
    }
    let mut pixels = Vec::with_capacity(count);
    let mut at = 0;

    while pixels.len() < count {
        let packet = *data.get(at).ok_or_else(truncated)?;
        at += 1;
        let run = (packet & 0x7F) as usize + 1;
        let run = run.min(count - pixels.len());

        if packet & 0x80 != 0 {
            let px = data.get(at..at + stride).ok_or_else(truncated)?;
            at += stride;
            pixels.extend(std::iter::repeat(pixel_at(px)).take(run));
        } else {
            let raw = data.get(at..at + run * stride).ok_or_else(truncated)?;
            at += run * stride;
            pixels.extend(raw.chunks_exact(stride).map(pixel_at));
        }
    }
    Ok(pixels)
}

fn flip_rows(pixels: &mut [u32], width: usize) {
    let rows = pixels.len() / width;
    for row in 0..rows / 2 {
        let (top, bottom) = pixels.split_at_mut((rows - 1 - row) * width);
        top[row * width..(row + 1) * width].swap_with_slice(&mut bottom[..width]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> PixelBuffer {
        let pixels = (0..12u32).map(|i| OPAQUE | i * 0x0001_0203).collect();
        PixelBuffer::from_pixels(4, 3, pixels).unwrap()
    }

    #[test]
    fn test_round_trip_both_depths() {
        let frame = sample_frame();
        for depth in [ImageDepth::Bgra32, ImageDepth::Bgr24] {
            let bytes = encode_targa(&frame, depth).unwrap();
            assert_eq!(bytes.len(), 18 + 12 * depth.bits() as usize / 8);
            assert_eq!(decode_targa(&bytes).unwrap(), frame);
        }
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode_targa(&PixelBuffer::new(720, 480), ImageDepth::Bgr24).unwrap();
        assert_eq!(
            &bytes[..18],
            &[0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xD0, 0x02, 0xE0, 0x01, 24, 0x20]
        );
    }

    #[test]
    fn test_bottom_up_images_are_flipped() {
        let frame = sample_frame();
        let mut bytes = encode_targa(&frame, ImageDepth::Bgr24).unwrap();
        bytes[17] = 0;

        let flipped = decode_targa(&bytes).unwrap();
        assert_eq!(flipped.get(0, 0), frame.get(0, 2));
        assert_eq!(flipped.get(3, 1), frame.get(3, 1));
        assert_eq!(flipped.get(2, 2), frame.get(2, 0));
    }

    #[test]
    fn test_rle_decoding() {
        let mut bytes = TargaHeader {
            id_len: 0,
            color_map_type: 0,
            image_type: TYPE_RLE_TRUE_COLOR,
            color_map_len: 0,
            color_map_entry_bits: 0,
            width: 3,
            height: 2,
            depth: 24,
            descriptor: TOP_LEFT_ORIGIN,
        }
        .to_bytes()
        .to_vec();
        // Run of four red pixels, then two raw pixels (blue, white)
        bytes.extend([0x83, 0x00, 0x00, 0xFF]);
        bytes.extend([0x01, 0xFF, 0x00, 0x00, 0xFF, 0xFF, 0xFF]);

        let frame = decode_targa(&bytes).unwrap();
        assert_eq!(
            frame.pixels(),
            &[
                0xFFFF_0000,
                0xFFFF_0000,
                0xFFFF_0000,
                0xFFFF_0000,
                0xFF00_00FF,
                0xFFFF_FFFF
            ]
        );
    }

    #[test]
    fn test_truncated_data() {
        let bytes = encode_targa(&sample_frame(), ImageDepth::Bgra32).unwrap();
        assert!(matches!(
            decode_targa(&bytes[..bytes.len() - 1]),
            Err(CliError::InvalidImage(_))
        ));
        assert!(matches!(
            decode_targa(&bytes[..10]),
            Err(CliError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_unsupported_types() {
        let mut bytes = encode_targa(&sample_frame(), ImageDepth::Bgr24).unwrap();
        bytes[2] = 3;
        assert!(matches!(decode_targa(&bytes), Err(CliError::InvalidImage(_))));

        bytes[2] = TYPE_TRUE_COLOR;
        bytes[16] = 16;
        assert!(matches!(
            decode_targa(&bytes),
            Err(CliError::UnsupportedDepth(16))
        ));
    }

    #[test]
    fn test_oversized_dimensions_are_rejected() {
        for image_type in [TYPE_TRUE_COLOR, TYPE_RLE_TRUE_COLOR] {
            let mut bytes = TargaHeader {
                id_len: 0,
                color_map_type: 0,
                image_type,
                color_map_len: 0,
                color_map_entry_bits: 0,
                width: u16::MAX,
                height: u16::MAX,
                depth: 32,
                descriptor: TOP_LEFT_ORIGIN,
            }
            .to_bytes()
            .to_vec();
            bytes.extend([0xFF, 0x00, 0x00, 0xFF, 0xFF]);

            assert!(
                matches!(decode_targa(&bytes), Err(CliError::InvalidImage(_))),
                "image type {image_type}"
            );
        }
    }

    #[test]
    fn test_skips_image_id() {
        let frame = sample_frame();
        let encoded = encode_targa(&frame, ImageDepth::Bgr24).unwrap();

        let mut bytes = encoded[..18].to_vec();
        bytes[0] = 5;
        bytes.extend(b"pxit!");
        bytes.extend(&encoded[18..]);
        assert_eq!(decode_targa(&bytes).unwrap(), frame);
    }
}
