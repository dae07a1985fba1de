use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate captions for a single video file
    Process {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Source language code for transcription
        #[arg(short, long, default_value = "en")]
        language: String,

        /// Target language code to translate subtitles to
        #[arg(short, long)]
        translate_to: Option<String>,
    },

    /// Generate captions for all video files in a directory
    Batch {
        /// Input directory containing video files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Source language code for transcription
        #[arg(short, long, default_value = "en")]
        language: String,

        /// Target language code to translate subtitles to
        #[arg(short, long)]
        translate_to: Option<String>,
    },

    /// Write a default configuration file
    InitConfig {
        /// Output path for the configuration file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}
