// Headless driver: compresses a JSON list of jobs as one batch.

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use image_compressor::messaging::TracingHandler;
use image_compressor::{
    CompressionSettings, Dispatcher, ImageCodec, JobRequest, MessageChannel, ObservableStore, Pump,
};

#[derive(Debug, Parser)]
#[command(name = "image-compressor", about = "Compress a batch of images, optionally to a target size")]
struct Args {
    /// JSON array of job requests
    jobs: PathBuf,
    /// Settings file; defaults apply to every field it omits
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false)
        .with_ansi(true)
        .with_writer(std::io::stdout)
        .compact()
        .init();

    let args = Args::parse();
    info!("=== Image compressor starting ===");

    let settings = match &args.settings {
        Some(path) => CompressionSettings::from_json_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => CompressionSettings::default(),
    };
    let raw = tokio::fs::read_to_string(&args.jobs)
        .await
        .with_context(|| format!("reading {}", args.jobs.display()))?;
    let requests: Vec<JobRequest> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", args.jobs.display()))?;

    let (messages, receiver) = MessageChannel::new();
    let pump = Pump::new(receiver, TracingHandler, &settings).spawn();
    let dispatcher = Dispatcher::new(
        Arc::new(ImageCodec::default()),
        settings,
        messages,
        ObservableStore::new(),
        tokio::runtime::Handle::current(),
    )?;

    let handle = dispatcher.submit_batch(requests)?;
    let cancel = handle.canceller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the current file");
            cancel.cancel();
        }
    });

    let summary = handle.wait().await?;
    pump.shutdown().await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    info!("{}", summary.summary_message());
    if summary.failed_count > 0 {
        std::process::exit(1);
    }
    Ok(())
}
