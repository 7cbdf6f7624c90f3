use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "screenshot-tool")]
#[command(about = "URL-to-image rendering service")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(long, help = "Enable verbose (debug) logging; overridden by RUST_LOG if set")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP service (default when no subcommand is given)
    Serve,

    /// Validate the process environment against the required configuration keys
    ValidateConfig {
        #[arg(short, long, help = "Optional .env-style file to load before validating")]
        env_file: Option<PathBuf>,
    },
}

pub fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::EnvFilter;

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    Ok(())
}
