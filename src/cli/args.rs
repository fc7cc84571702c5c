//! CLI argument parsing with clap.

use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::sequencer::MAX_CAPTURE_COUNT;

fn count_parser() -> RangedU64ValueParser<u32> {
    RangedU64ValueParser::new().range(1..=u64::from(MAX_CAPTURE_COUNT))
}

/// Capture webcam stills for face enrollment
#[derive(Parser, Debug)]
#[command(name = "enroll-capture")]
#[command(version, about = "Webcam capture for student face enrollment", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Use the synthetic test camera instead of a real webcam
    #[arg(long, global = true)]
    pub mock: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available cameras
    ListCameras,
    /// Capture a batch of frames and save them as JPEG files
    Capture {
        /// Number of frames (default from config)
        #[arg(long, short = 'n', value_parser = count_parser())]
        count: Option<u32>,
        /// Output directory
        #[arg(long, short, default_value = "captures")]
        out: PathBuf,
    },
    /// Capture a batch and register it with the backend
    Register {
        /// Student name
        #[arg(long)]
        name: String,
        /// Registration ID
        #[arg(long)]
        reg_id: String,
        /// Number of frames (default from config)
        #[arg(long, short = 'n', value_parser = count_parser())]
        count: Option<u32>,
    },
    /// Look a student up by registration ID
    Login {
        #[arg(long)]
        reg_id: String,
    },
    /// Fetch per-student monitoring reports
    Reports {
        /// Also write the reports to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Show students currently seen by the monitoring camera
    Students,
    /// Show live monitoring status for one student
    Status {
        #[arg(long)]
        reg_id: String,
    },
    /// Delete all enrolled students on the backend
    DeleteAll {
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}
