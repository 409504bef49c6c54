pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "arbore")]
#[command(about = "Share directory trees over a content-addressed store")]
pub struct Args {
    /// Path to the arbore config directory (defaults to ~/.arbore)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
