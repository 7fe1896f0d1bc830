//! pxit CLI - send files through a video channel as four-colored frames
//!
//! The encoder renders a file as a sequence of Targa images; the decoder and
//! the live capture loop turn those images back into the original file.

mod commands;
mod config;
mod error;
mod formats;
mod utils;

use anyhow::Result;
use clap::Parser;
use commands::Commands;
use config::Config;

#[derive(Parser)]
#[command(
    name = "pxit",
    version,
    about = "pxit - file transfer over four-colored still images",
    long_about = "Encodes files as sequences of red, white, blue and green grid images that survive \
                  an analog video link, and reassembles them from still images or a raw capture \
                  stream, in any order and with any amount of loss or repetition."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let config = Config::load(cli.config.as_deref())?;

    match cli.command.execute(&config) {
        Ok(()) => Ok(()),
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {}", e);

                if cli.verbose {
                    let mut source = e.source();
                    while let Some(err) = source {
                        eprintln!("  Caused by: {}", err);
                        source = err.source();
                    }
                }
            }
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();
}
