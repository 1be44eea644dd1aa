use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "burnsight")]
#[command(author, version, about = "Satellite imagery and VLM analysis backend")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the backend server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "5000")]
        port: u16,
    },

    /// Check that credentials, directories, and external tools are set up
    Check,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Run a one-shot VLM analysis on a local image file
    Analyze {
        /// Image file to analyze
        #[arg(required = true)]
        image: PathBuf,

        /// Question to ask about the image
        #[arg(short, long, default_value = "Describe what you see in this image.")]
        prompt: String,
    },

    /// Display version information
    Version,
}
