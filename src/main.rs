use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use ingestlab::config::{DriverStrategy, PipelineConfig, RunMode};
use ingestlab::ids::UuidGenerator;
use ingestlab::observability::ProgressReporter;
use ingestlab::{audit, logging, store, IngestPipeline};

/// Synthetic video-analytics ingestion workload for stress-testing a key-value store
#[derive(Parser)]
#[command(name = "ingestlab")]
#[command(about = "Drives synthetic camera frames through a multi-stage enrichment pipeline")]
pub struct Args {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Store host
    #[arg(long)]
    pub host: Option<String>,

    /// Store port
    #[arg(long)]
    pub port: Option<u16>,

    /// bounded or continuous
    #[arg(long, value_enum)]
    pub mode: Option<RunMode>,

    /// Total frames to emit (bounded mode)
    #[arg(long)]
    pub frames: Option<u64>,

    /// Number of simulated camera streams
    #[arg(long)]
    pub streams: Option<u32>,

    /// sequential or pool (bounded mode)
    #[arg(long, value_enum)]
    pub driver: Option<DriverStrategy>,

    /// Maximum pool workers running at once
    #[arg(long)]
    pub pool_concurrency: Option<usize>,

    /// Pause between sweeps and progress reports (continuous mode)
    #[arg(long)]
    pub report_interval_ms: Option<u64>,

    /// Buffer size of every stage-to-stage channel
    #[arg(long)]
    pub channel_capacity: Option<usize>,

    /// Base URL thumbnails are served from
    #[arg(long)]
    pub thumbnail_base_url: Option<String>,

    /// Audit every record after a bounded run
    #[arg(long)]
    pub verify: bool,
}

impl Args {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(host) = &self.host {
            config.store.host = host.clone();
        }
        if let Some(port) = self.port {
            config.store.port = port;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(frames) = self.frames {
            config.frame_count = frames;
        }
        if let Some(streams) = self.streams {
            config.stream_count = streams;
        }
        if let Some(driver) = self.driver {
            config.driver = driver;
        }
        if self.pool_concurrency.is_some() {
            config.pool_concurrency = self.pool_concurrency;
        }
        if let Some(interval) = self.report_interval_ms {
            config.report_interval_ms = interval;
        }
        if let Some(capacity) = self.channel_capacity {
            config.channel_capacity = capacity;
        }
        if let Some(url) = &self.thumbnail_base_url {
            config.thumbnail_base_url = url.clone();
        }
        if self.verify {
            config.verify = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_tracing(&args.log_level);

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    let store = store::connect(&config.store)?;
    let mut pipeline = IngestPipeline::new(config.clone(), store.clone(), Arc::new(UuidGenerator))?;
    let reporter = ProgressReporter::new(pipeline.counters());

    pipeline.start()?;

    match config.mode {
        RunMode::Bounded => {
            let summary = pipeline.wait().await?;
            println!("{}", ProgressReporter::render(&summary.counters, summary.elapsed));

            if config.verify {
                let report = audit::verify_store(
                    store.as_ref(),
                    &config.store.location(),
                    &pipeline.table(),
                    Some(config.frame_count),
                )
                .await?;

                for violation in report.violations.iter().take(20) {
                    warn!(%violation, "record check failed");
                }
                if !report.is_clean() {
                    bail!(
                        "audit failed: {} violations across {} records",
                        report.violations.len(),
                        report.records
                    );
                }
                println!("audit passed: {} records", report.records);
            }
        }
        RunMode::Continuous => {
            let interrupted = tokio::select! {
                result = pipeline.wait() => {
                    result?;
                    false
                }
                _ = tokio::signal::ctrl_c() => true,
            };

            if interrupted {
                info!("interrupted, stopping");
                pipeline.abort().await;
                println!("{}", reporter.report());
            }
        }
    }

    Ok(())
}
