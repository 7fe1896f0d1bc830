//! Reads a symbol stream back out of a pixel buffer.
//!
//! One pixel per cell, the cell center, is classified by a dominant-channel
//! rule. Anything that is not clearly one of the four colors is reported as
//! [`Classification::Unclassifiable`] instead of being guessed.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;
use crate::raster::{paint_cell, PixelBuffer, Rgb, BLACK};
use crate::symbol::{CellColor, Symbol};
use crate::{PxitError, Result};

/// Intensity thresholds for color classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct Thresholds {
    /// Every channel must exceed this for a pixel to read as white
    pub white: u8,
    /// The dominant channel must exceed this for a pixel to read as a color
    pub min_intensity: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            white: 180,
            min_intensity: 50,
        }
    }
}

/// The reading of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Color(CellColor),
    /// Dim, tied or otherwise ambiguous pixel
    Unclassifiable,
}

impl Classification {
    /// The symbol carried by the cell, if it could be read.
    pub fn symbol(self) -> Option<Symbol> {
        match self {
            Self::Color(color) => Some(color.symbol()),
            Self::Unclassifiable => None,
        }
    }
}

/// Classifies an RGB value.
pub fn classify(rgb: Rgb, thresholds: &Thresholds) -> Classification {
    let Rgb { red, green, blue } = rgb;

    if red > thresholds.white && green > thresholds.white && blue > thresholds.white {
        Classification::Color(CellColor::White)
    } else if red > green && red > blue && red > thresholds.min_intensity {
        Classification::Color(CellColor::Red)
    } else if blue > green && blue > red && blue > thresholds.min_intensity {
        Classification::Color(CellColor::Blue)
    } else if green > red && green > blue && green > thresholds.min_intensity {
        Classification::Color(CellColor::Green)
    } else {
        Classification::Unclassifiable
    }
}

/// Raw pixel values at a cell's sample point and one row below it.
///
/// Interlaced captures can carry two source frames in alternating lines;
/// comparing both rows shows which field a reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellReading {
    pub row: usize,
    pub column: usize,
    pub center: u32,
    pub below: u32,
}

/// Samples and classifies the grid cells of a frame.
#[derive(Debug, Clone)]
pub struct ColorSampler {
    geometry: Geometry,
    thresholds: Thresholds,
}

impl ColorSampler {
    /// Creates a sampler for the given geometry.
    ///
    /// # Errors
    /// Returns `PxitError::InvalidGeometry` if the geometry is inconsistent.
    pub fn new(geometry: Geometry, thresholds: Thresholds) -> Result<Self> {
        geometry.validate()?;
        Ok(Self {
            geometry,
            thresholds,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Lazily classifies every cell of `frame`, row by row.
    ///
    /// The iterator borrows the frame and can be recreated at will; each call
    /// yields exactly `geometry.cells()` items.
    ///
    /// # Errors
    /// Returns `PxitError::FrameSize` if the frame dimensions do not match.
    pub fn classify_cells<'a>(
        &'a self,
        frame: &'a PixelBuffer,
    ) -> Result<impl Iterator<Item = Classification> + 'a> {
        self.check_frame(frame)?;
        Ok((0..self.geometry.cells()).map(move |cell| {
            let (x, y) = self.geometry.sample_point(cell);
            classify(Rgb::from_argb(frame.get(x, y)), &self.thresholds)
        }))
    }

    /// Reads the symbols that carry one packet.
    ///
    /// Slack cells past the packet are not examined. Returns `Ok(None)` if
    /// any packet cell is unclassifiable.
    pub fn read_symbols(&self, frame: &PixelBuffer) -> Result<Option<Vec<Symbol>>> {
        Ok(self
            .classify_cells(frame)?
            .take(self.geometry.symbols_per_packet())
            .map(Classification::symbol)
            .collect())
    }

    /// Raw pixel values at every sample point and the row beneath it.
    pub fn readings(&self, frame: &PixelBuffer) -> Result<Vec<CellReading>> {
        self.check_frame(frame)?;
        let columns = self.geometry.columns();
        Ok((0..self.geometry.cells())
            .map(|cell| {
                let (x, y) = self.geometry.sample_point(cell);
                CellReading {
                    row: cell / columns,
                    column: cell % columns,
                    center: frame.get(x, y),
                    below: frame.get(x, (y + 1).min(frame.height() - 1)),
                }
            })
            .collect())
    }

    /// Redraws the grid from its classification, black for unreadable cells.
    pub fn render_classification(&self, frame: &PixelBuffer) -> Result<PixelBuffer> {
        let mut rendered = PixelBuffer::new(self.geometry.width, self.geometry.height);
        for (cell, classification) in self.classify_cells(frame)?.enumerate() {
            let pixel = match classification {
                Classification::Color(color) => color.argb(),
                Classification::Unclassifiable => BLACK,
            };
            paint_cell(&self.geometry, &mut rendered, cell, pixel);
        }
        Ok(rendered)
    }

    fn check_frame(&self, frame: &PixelBuffer) -> Result<()> {
        if !frame.matches(&self.geometry) {
            return Err(PxitError::FrameSize {
                expected: self.geometry.pixels(),
                actual: frame.pixels().len(),
            });
        }
        Ok(())
    }
}
