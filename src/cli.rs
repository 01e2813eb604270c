use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "enigmamachine")]
#[command(author, version, about = "Video encoding queue driven by ffmpeg task chains")]
pub struct Cli {
    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the database path from the config
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the encoding service and HTTP API
    Start {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check that ffmpeg is available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,

    /// Manage encoders and their task chains
    #[command(subcommand)]
    Encoder(EncoderCommand),

    /// Manage queued videos
    #[command(subcommand)]
    Video(VideoCommand),
}

#[derive(Subcommand)]
pub enum EncoderCommand {
    /// Create an encoder with an empty task chain
    Create {
        /// Unique encoder name
        name: String,
    },

    /// List encoders
    List,

    /// Show an encoder and its tasks
    Show {
        /// Encoder ID or name
        encoder: String,
    },

    /// Append a task to the end of an encoder's chain
    AddTask {
        /// Encoder ID or name
        encoder: String,

        /// Task name
        #[arg(long, default_value = "")]
        name: String,

        /// Suffix appended to the source file stem, e.g. "-small.mp4"
        #[arg(long)]
        suffix: String,

        /// ffmpeg arguments; may contain {input} and {output}
        #[arg(long, allow_hyphen_values = true)]
        command: String,
    },

    /// Remove a task from its encoder
    RemoveTask {
        /// Task ID
        task: String,
    },

    /// Delete an encoder that no video references
    Delete {
        /// Encoder ID or name
        encoder: String,
    },
}

#[derive(Subcommand)]
pub enum VideoCommand {
    /// Queue a video for encoding
    Add {
        /// Source file
        file: PathBuf,

        /// Encoder ID or name
        #[arg(short, long)]
        encoder: String,

        /// URL to POST to when the video completes
        #[arg(long)]
        callback_url: Option<String>,
    },

    /// List videos
    List {
        /// Only videos in this state (unencoded, encoding, complete, error)
        #[arg(long)]
        state: Option<String>,

        /// Maximum rows
        #[arg(long, default_value = "50")]
        limit: i64,
    },

    /// Show one video
    Show {
        /// Video ID
        id: String,
    },

    /// Put a complete or failed video back in the queue
    Requeue {
        /// Video ID
        id: String,
    },

    /// Delete a video record
    Delete {
        /// Video ID
        id: String,
    },
}
