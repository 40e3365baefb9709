//! Command line [`Args`].

use clap::Parser;

/// Server of the rental marketplace booking engine.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

impl Args {
    /// Parses the command line arguments.
    ///
    /// # Errors
    ///
    /// If the command line arguments are malformed.
    pub fn parse() -> Result<Self, clap::Error> {
        <Self as Parser>::try_parse()
    }
}
