//! Scope command implementation

use anyhow::{bail, Context, Result};
use clap::Args;
use pxit_core::raster::{mark_sample_points, paint_cell};
use pxit_core::{CellColor, Classification, ColorSampler, PixelBuffer};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::config::Config;
use crate::formats::{read_targa, write_targa, ImageDepth};
use crate::utils::{base_path, check_frame_size, sibling};

#[derive(Args)]
pub struct ScopeCommand {
    /// Captured frame to analyze
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Bits per pixel of the written images
    #[arg(long, value_enum, default_value = "32")]
    pub depth: ImageDepth,
}

impl ScopeCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        let is_targa = self
            .image
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tga"));
        if !is_targa {
            bail!("Input file should end in '.tga': {}", self.image.display());
        }

        let frame = read_targa(&self.image)?;
        check_frame_size(&frame, &config.geometry)?;

        let geometry = config.geometry;
        let sampler = ColorSampler::new(geometry, config.classifier)?;
        let base = base_path(&self.image);

        println!("Analyzing {}", self.image.display());

        let readings = sampler.readings(&frame)?;
        let data_path = sibling(&base, "-data.txt");
        let file = fs::File::create(&data_path)
            .with_context(|| format!("Failed to create {}", data_path.display()))?;
        let mut data = BufWriter::new(file);
        for reading in &readings {
            writeln!(
                data,
                "row {}, col {}: z1 = {:08x}, z2 = {:08x}",
                reading.row, reading.column, reading.center, reading.below
            )?;
        }
        data.flush()?;

        let mut annotated = frame.clone();
        mark_sample_points(&geometry, &mut annotated);
        let annotated_path = sibling(&base, "-annotated.tga");
        write_targa(&annotated_path, &annotated, self.depth)?;

        let classified = sampler.render_classification(&frame)?;
        let classified_path = sibling(&base, "-classified.tga");
        write_targa(&classified_path, &classified, self.depth)?;

        // The row below each sample point, drawn as is; on an interlaced
        // capture this shows the other field
        let mut raw = PixelBuffer::new(geometry.width, geometry.height);
        for (cell, reading) in readings.iter().enumerate() {
            paint_cell(&geometry, &mut raw, cell, reading.below);
        }
        let raw_path = sibling(&base, "-raw.tga");
        write_targa(&raw_path, &raw, self.depth)?;

        self.print_summary(&sampler, &frame)?;
        for path in [&data_path, &annotated_path, &classified_path, &raw_path] {
            println!("  wrote {}", path.display());
        }
        Ok(())
    }

    fn print_summary(&self, sampler: &ColorSampler, frame: &PixelBuffer) -> Result<()> {
        let mut counts = [0usize; 4];
        let mut unclassifiable = 0;
        for classification in sampler.classify_cells(frame)? {
            match classification {
                Classification::Color(color) => counts[color.symbol().value() as usize] += 1,
                Classification::Unclassifiable => unclassifiable += 1,
            }
        }

        println!("Cell Colors");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━");
        for color in CellColor::ALL {
            println!("{:<15} {}", color, counts[color.symbol().value() as usize]);
        }
        println!("{:<15} {}", "unclassifiable", unclassifiable);
        Ok(())
    }
}
