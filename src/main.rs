// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use cone_steering::frame_source::{ImageSequenceSource, SharedFrameBuffer};
use cone_steering::ground_truth::{load_ground_truth_csv, GroundTruthCell, GroundTruthFeed};
use cone_steering::overlay::AnnotatedWriter;
use cone_steering::recording::{write_summary, RecordWriter};
use cone_steering::session::Session;
use cone_steering::{run_loop, Config, PipelineSinks, RunSummary, SteeringPipeline};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cone-steering", about = "Estimate steering from track cones", version)]
struct Args {
    /// YAML configuration file. Missing file means built-in defaults.
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Directory of frame images (overrides input.frames_dir).
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Ground truth replay CSV with `timestamp_us,value` rows.
    #[arg(long)]
    ground_truth: Option<PathBuf>,

    /// Output directory (overrides output.dir).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Log every frame and save annotated crops.
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load_or_default(&args.config)?;
    if let Some(frames) = &args.frames {
        config.input.frames_dir = frames.display().to_string();
    }
    if let Some(gt) = &args.ground_truth {
        config.ground_truth.replay_csv = Some(gt.display().to_string());
    }
    if let Some(out) = &args.output {
        config.output.dir = out.display().to_string();
    }
    if args.verbose {
        config.output.save_annotated = true;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("🚗 Cone Steering Estimator Starting");
    info!("✓ Configuration loaded from {}", args.config.display());
    info!(
        "Zones: far_left={} left={} center={} right={} far_right={} ({:?} table), tolerance={}",
        config.zones.far_left,
        config.zones.left,
        config.zones.center,
        config.zones.right,
        config.zones.far_right,
        config.zones.table,
        config.accuracy.tolerance
    );

    let source = ImageSequenceSource::open(&config.input.frames_dir, &config.input)?;
    if source.is_empty() {
        // The run still goes through so the no-data summary gets written.
        error!("No frame images found in {}", config.input.frames_dir);
    }

    let samples = match &config.ground_truth.replay_csv {
        Some(path) => {
            let samples = load_ground_truth_csv(path)?;
            info!("✓ {} ground truth samples loaded from {}", samples.len(), path);
            samples
        }
        None => {
            warn!("No ground truth source configured, comparing against 0.0");
            Vec::new()
        }
    };

    let out_dir = Path::new(&config.output.dir).to_path_buf();
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut sinks = PipelineSinks {
        records: Some(RecordWriter::create(out_dir.join(&config.output.records_file))?),
        annotated: None,
        verbose: args.verbose,
    };
    if config.output.save_annotated {
        sinks.annotated = Some(AnnotatedWriter::create(out_dir.join("annotated"))?);
    }

    let session = Session::new();
    let buffer = Arc::new(SharedFrameBuffer::new());
    let cell = GroundTruthCell::new();
    let feed = GroundTruthFeed::new(Arc::clone(&cell), config.ground_truth.message_id);

    {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                session.stop();
            }
        });
    }

    let producer = {
        let buffer = Arc::clone(&buffer);
        let session = Arc::clone(&session);
        tokio::task::spawn_blocking(move || source.run(&buffer, &feed, &samples, &session))
    };

    let consumer = {
        let buffer = Arc::clone(&buffer);
        let session = Arc::clone(&session);
        let cell = Arc::clone(&cell);
        let config = config.clone();
        tokio::task::spawn_blocking(move || -> Result<(u64, RunSummary, PipelineSinks)> {
            let mut pipeline = SteeringPipeline::from_config(&config);
            info!("✓ Pipeline ready");
            let processed = run_loop(&mut pipeline, &buffer, &cell, &session, &mut sinks)?;
            Ok((processed, pipeline.summary(cell.samples_received()), sinks))
        })
    };

    let (processed, summary, sinks) = consumer.await.context("Processing loop panicked")??;
    let published = producer.await.context("Frame producer panicked")??;

    if let Some(records) = sinks.records {
        records.finish()?;
    }
    if let Some(annotated) = &sinks.annotated {
        info!("  Annotated frames: {}", annotated.written());
    }

    write_summary(out_dir.join(&config.output.summary_file), &summary)?;
    report(&summary, processed, published);
    Ok(())
}

fn report(summary: &RunSummary, processed: u64, published: usize) {
    info!("\n📊 Final Report:");
    info!("  Frames published: {}", published);
    info!("  Frames processed: {}", processed);
    info!("  Within tolerance: {}", summary.frames_within_tolerance);
    info!("  Percentage: {}", summary.percentage_label());
    info!("  Frozen frames: {}", summary.frozen_frames);
    info!(
        "  Frames with blue / yellow cone: {} / {}",
        summary.frames_with_blue, summary.frames_with_yellow
    );
    info!("  Ground truth samples: {}", summary.ground_truth_samples);
    if summary.elapsed_secs > 0.0 {
        info!(
            "  Processing Speed: {:.1} FPS",
            summary.total_frames as f64 / summary.elapsed_secs
        );
    }
}
