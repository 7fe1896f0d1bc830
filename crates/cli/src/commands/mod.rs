//! Command implementations for the pxit CLI

mod capture;
mod decode;
mod encode;
mod inspect;
mod scope;

pub use capture::CaptureCommand;
pub use decode::DecodeCommand;
pub use encode::EncodeCommand;
pub use inspect::InspectCommand;
pub use scope::ScopeCommand;

use crate::config::Config;
use anyhow::Result;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Render a file as a sequence of frame images
    Encode(EncodeCommand),

    /// Reassemble files from a directory of frame images
    Decode(DecodeCommand),

    /// Decode a live raw YUYV capture stream
    Capture(CaptureCommand),

    /// Write diagnostic views of a captured frame
    Scope(ScopeCommand),

    /// Show the packet carried by frame images
    Inspect(InspectCommand),
}

impl Commands {
    pub fn execute(&self, config: &Config) -> Result<()> {
        match self {
            Commands::Encode(cmd) => cmd.execute(config),
            Commands::Decode(cmd) => cmd.execute(config),
            Commands::Capture(cmd) => cmd.execute(config),
            Commands::Scope(cmd) => cmd.execute(config),
            Commands::Inspect(cmd) => cmd.execute(config),
        }
    }
}
