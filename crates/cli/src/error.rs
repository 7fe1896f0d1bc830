//! Error handling

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Unsupported image depth: {0} bits per pixel (expected 24 or 32)")]
    UnsupportedDepth(u8),

    #[error("Image is {width}x{height}, expected {expected_width}x{expected_height}")]
    ImageSize {
        width: usize,
        height: usize,
        expected_width: usize,
        expected_height: usize,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
