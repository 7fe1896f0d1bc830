//! Pixel buffers and cell painting.

use crate::geometry::Geometry;
use crate::symbol::{CellColor, Symbol};
use crate::{PxitError, Result};

/// Opaque black, used for the background and for unreadable cells.
pub const BLACK: u32 = 0xFF00_0000;

/// Marker color drawn at sample points by [`mark_sample_points`].
pub const MARKER: u32 = 0xFF00_FFFF;

/// Red, green and blue channels of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    /// Splits a 0xAARRGGBB pixel into its color channels.
    #[inline]
    pub fn from_argb(pixel: u32) -> Self {
        Self {
            red: (pixel >> 16) as u8,
            green: (pixel >> 8) as u8,
            blue: pixel as u8,
        }
    }

    /// Packs the channels into an opaque 0xAARRGGBB pixel.
    #[inline]
    pub fn to_argb(self) -> u32 {
        BLACK | (self.red as u32) << 16 | (self.green as u32) << 8 | self.blue as u32
    }
}

/// A row-major image of 0xAARRGGBB pixels, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl PixelBuffer {
    /// Creates an opaque black image.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![BLACK; width * height],
        }
    }

    /// Wraps existing pixels.
    ///
    /// # Errors
    /// Returns `PxitError::FrameSize` if `pixels` does not hold exactly
    /// `width * height` entries.
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<u32>) -> Result<Self> {
        if pixels.len() != width * height {
            return Err(PxitError::FrameSize {
                expected: width * height,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u32> {
        self.pixels
    }

    /// Returns the pixel at column `x`, row `y`.
    ///
    /// # Panics
    /// Panics if the coordinates are outside the image.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u32 {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        self.pixels[y * self.width + x]
    }

    /// Sets the pixel at column `x`, row `y`.
    ///
    /// # Panics
    /// Panics if the coordinates are outside the image.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, pixel: u32) {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        self.pixels[y * self.width + x] = pixel;
    }

    /// Fills the rectangle `[left, right) x [top, bottom)`, clipped to the image.
    pub fn fill_rect(&mut self, left: usize, top: usize, right: usize, bottom: usize, pixel: u32) {
        let right = right.min(self.width);
        let bottom = bottom.min(self.height);
        for y in top..bottom {
            let row = y * self.width;
            self.pixels[row + left.min(right)..row + right].fill(pixel);
        }
    }

    /// Returns true if the dimensions match `geometry`.
    pub fn matches(&self, geometry: &Geometry) -> bool {
        self.width == geometry.width && self.height == geometry.height
    }
}

/// Fills one grid cell with a solid pixel value.
pub fn paint_cell(geometry: &Geometry, frame: &mut PixelBuffer, cell: usize, pixel: u32) {
    let size = geometry.cell_size;
    let left = (cell % geometry.columns()) * size;
    let top = (cell / geometry.columns()) * size;
    frame.fill_rect(left, top, left + size, top + size, pixel);
}

/// Paints a full frame from a symbol stream.
///
/// Cells past the end of `symbols` are painted with [`Symbol::PADDING`].
pub fn paint_symbols(geometry: &Geometry, symbols: &[Symbol]) -> PixelBuffer {
    let mut frame = PixelBuffer::new(geometry.width, geometry.height);
    let padding = std::iter::repeat(Symbol::PADDING);

    for (cell, symbol) in symbols.iter().copied().chain(padding).take(geometry.cells()).enumerate() {
        paint_cell(geometry, &mut frame, cell, CellColor::from_symbol(symbol).argb());
    }
    frame
}

/// Draws a marker dot on every sample point, for diagnostic snapshots.
pub fn mark_sample_points(geometry: &Geometry, frame: &mut PixelBuffer) {
    for cell in 0..geometry.cells() {
        let (x, y) = geometry.sample_point(cell);
        frame.set(x, y, MARKER);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_channels() {
        let rgb = Rgb::from_argb(0xFF12_3456);
        assert_eq!(
            rgb,
            Rgb {
                red: 0x12,
                green: 0x34,
                blue: 0x56
            }
        );
        assert_eq!(rgb.to_argb(), 0xFF12_3456);
    }

    #[test]
    fn test_from_pixels_checks_size() {
        assert!(PixelBuffer::from_pixels(2, 2, vec![0; 4]).is_ok());
        assert!(matches!(
            PixelBuffer::from_pixels(2, 2, vec![0; 3]),
            Err(PxitError::FrameSize {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_paint_fills_whole_cells() {
        let geometry = Geometry::default();
        let symbols = [Symbol::from_bits(2), Symbol::from_bits(1)];
        let frame = paint_symbols(&geometry, &symbols);

        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(frame.get(x, y), CellColor::Blue.argb());
                assert_eq!(frame.get(x + 16, y), CellColor::White.argb());
            }
        }
        // The rest of the grid is padding
        assert_eq!(frame.get(719, 479), CellColor::Red.argb());
    }

    #[test]
    fn test_mark_sample_points() {
        let geometry = Geometry::default();
        let mut frame = PixelBuffer::new(geometry.width, geometry.height);
        mark_sample_points(&geometry, &mut frame);

        assert_eq!(frame.get(8, 8), MARKER);
        assert_eq!(frame.get(0, 0), BLACK);
        assert_eq!(frame.pixels().iter().filter(|&&p| p == MARKER).count(), 1350);
    }

    #[test]
    fn test_fill_rect_is_clipped() {
        let mut frame = PixelBuffer::new(4, 4);
        frame.fill_rect(2, 2, 10, 10, 1);
        assert_eq!(frame.pixels().iter().filter(|&&p| p == 1).count(), 4);
    }
}
