//! Entry point for `qrlink`.
//!
//! Owns process setup only: logging, configuration, Ctrl-C handling and the
//! choice of devices. The protocol engines are blocking and run on tokio's
//! blocking pool.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, RecvArgs, SendArgs};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use qrlink::config::LinkConfig;
use qrlink::link::{
    frame_count, FrameSink, FrameSource, Receiver, ReceiverConfig, Transmitter, TransmitterConfig,
};
use qrlink::optical::{spool, Image, NullDisplay, ReplayCamera, SpoolRole};
use qrlink::LinkError;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Conventional exit status for a SIGINT-terminated process.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if matches!(e.downcast_ref::<LinkError>(), Some(LinkError::Interrupted)) {
                eprintln!("{}", "Interrupted".yellow().bold());
                ExitCode::from(EXIT_INTERRUPTED)
            } else {
                eprintln!("{} {:#}", "error:".red().bold(), e);
                ExitCode::FAILURE
            }
        }
    }
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("qrlink={}", cli.log_level())));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config =
        LinkConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let abort = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&abort);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping session");
            flag.store(true, Ordering::SeqCst);
        }
    });

    match cli.command {
        Command::Send(args) => send(args, config, abort, cli.quiet).await,
        Command::Recv(args) => recv(args, config, abort, cli.quiet).await,
    }
}

async fn send(
    args: SendArgs,
    mut config: LinkConfig,
    abort: Arc<AtomicBool>,
    quiet: bool,
) -> Result<()> {
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
        config.validate()?;
    }

    let path = std::fs::canonicalize(&args.file)
        .map_err(|source| LinkError::SourceAccess {
            path: args.file.clone(),
            source,
        })
        .context("Cannot transmit")?;
    let len = std::fs::metadata(&path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();

    let spool_dir = args.spool.unwrap_or_else(|| config.spool_dir.clone());
    let codec = config.qr_codec()?;
    let (camera, display) = spool::open(&spool_dir, SpoolRole::Transmitter, config.poll_interval())
        .with_context(|| format!("Failed to open spool {}", spool_dir.display()))?;
    tracing::info!("Using spool {}", spool_dir.display());

    let bar = progress_bar(frame_count(len, config.chunk_size), quiet)?;
    let tick = bar.clone();
    let tx_config = TransmitterConfig {
        chunk_size: config.chunk_size,
    };
    let source = path.clone();

    let stats = tokio::task::spawn_blocking(move || {
        let mut tx = Transmitter::new(tx_config, codec, camera, display).with_abort_flag(abort);
        tx.transmit_with(&source, |p| {
            tick.set_position(p.frames_acked);
            tick.set_message(format!("{} tag {}", p.kind.as_str(), p.tag));
        })
    })
    .await
    .context("Transmitter task failed")?;
    bar.finish_and_clear();
    let stats = stats.context("Transmission failed")?;

    if !quiet {
        println!(
            "{} Sent {} ({} bytes in {} frames, {} polls without ack)",
            "✓".green().bold(),
            path.display().to_string().bold(),
            stats.bytes,
            stats.frames,
            stats.unmatched_polls
        );
    }
    Ok(())
}

async fn recv(
    args: RecvArgs,
    config: LinkConfig,
    abort: Arc<AtomicBool>,
    quiet: bool,
) -> Result<()> {
    let codec = config.qr_codec()?;
    let rx_config = ReceiverConfig {
        output_dir: args.output_dir,
        grace_period: args
            .grace_ms
            .map(std::time::Duration::from_millis)
            .unwrap_or_else(|| config.grace_period()),
    };

    let (camera, display): (Box<dyn FrameSource + Send>, Box<dyn FrameSink + Send>) =
        match args.replay {
            Some(dir) => {
                let camera = ReplayCamera::open(&dir)
                    .with_context(|| format!("Failed to open replay {}", dir.display()))?;
                tracing::info!("Replaying {} captures from {}", camera.remaining(), dir.display());
                (Box::new(camera), Box::new(NullDisplay))
            }
            None => {
                let dir = args.spool.unwrap_or_else(|| config.spool_dir.clone());
                let (camera, display) =
                    spool::open(&dir, SpoolRole::Receiver, config.poll_interval())
                        .with_context(|| format!("Failed to open spool {}", dir.display()))?;
                tracing::info!("Using spool {}", dir.display());
                (Box::new(camera), Box::new(display))
            }
        };

    let preview = args.preview;
    let report = tokio::task::spawn_blocking(move || {
        let mut rx = Receiver::new(rx_config, codec, camera, display).with_abort_flag(abort);
        if let Some(path) = preview {
            rx = rx.with_observer(move |image: &Image| {
                if image.is_empty() {
                    return;
                }
                if let Err(e) = spool::save_png(image, &path) {
                    tracing::debug!("Preview write failed: {}", e);
                }
            });
        }
        rx.receive()
    })
    .await
    .context("Receiver task failed")?
    .context("Reception failed")?;

    if !quiet {
        println!(
            "{} Received {} -> {} ({} bytes, {} duplicate frames)",
            "✓".green().bold(),
            report.sent_name,
            report.path.display().to_string().bold(),
            report.stats.bytes,
            report.stats.duplicates
        );
    }
    Ok(())
}

fn progress_bar(total: u64, quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} frames {msg}")?
            .progress_chars("#>-"),
    );
    Ok(bar)
}
