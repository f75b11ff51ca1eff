use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Air-gapped file transfer over QR codes.
#[derive(Parser, Debug)]
#[command(name = "qrlink", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (default: <config dir>/qrlink/config.toml)
    #[arg(long, global = true, env = "QRLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only warnings and errors; no progress bar
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Transmit a file
    Send(SendArgs),
    /// Receive a file into the output directory
    Recv(RecvArgs),
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// File to transmit
    pub file: PathBuf,

    /// File bytes per frame
    #[arg(long, env = "QRLINK_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Spool directory shared with the receiver
    #[arg(long)]
    pub spool: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RecvArgs {
    /// Directory the received file is written into
    #[arg(short, long, default_value = ".", env = "QRLINK_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Spool directory shared with the transmitter
    #[arg(long, conflicts_with = "replay")]
    pub spool: Option<PathBuf>,

    /// Read recorded captures from a directory instead of a live spool
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Milliseconds the final ack stays up before exiting
    #[arg(long, env = "QRLINK_GRACE_MS")]
    pub grace_ms: Option<u64>,

    /// Keep the most recent captured frame at this path (PNG)
    #[arg(long)]
    pub preview: Option<PathBuf>,
}

impl Cli {
    /// Filter directive used when RUST_LOG is not set.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
