//! framepace CLI
//!
//! Command-line interface for scheduling near-duplicate video frames.

use clap::{Args, Parser, Subcommand};
use framepace::{
    config::ConfigOverrides, open_sink, open_source, FrameReader, Progress, ProgressReporter,
    RunSummary, Scheduler, SchedulerConfig,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "framepace")]
#[command(about = "Repeat near-duplicate frames so downsampling keeps every distinct one")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule repeat counts and write the fixed video
    Fix {
        /// Input video (`-` for a YUV4MPEG2 stream on stdin)
        input: PathBuf,

        /// Output video (`-` for a YUV4MPEG2 stream on stdout)
        output: PathBuf,

        #[command(flatten)]
        options: SchedulerArgs,

        /// TOML file with scheduler options (flags take precedence)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only log warnings and errors, no progress lines
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show stream information for an input
    Probe {
        /// Input video (`-` for stdin)
        input: PathBuf,
    },

    /// Show default scheduler settings
    Defaults,
}

/// Scheduler options, read as real numbers like the config file
#[derive(Args, Debug, Default)]
struct SchedulerArgs {
    /// Distinct frames held in the sliding window
    #[arg(short, long)]
    buffer_size: Option<f64>,

    /// Shrink factor for comparison images
    #[arg(short = 's', long)]
    comparison_scale: Option<f64>,

    /// Largest tolerated drift in frames
    #[arg(short, long)]
    adjustment_bound: Option<f64>,

    /// Copies each distinct frame needs
    #[arg(short, long)]
    duplicate_count: Option<f64>,

    /// Dissimilarity cutoff below the duplicate target
    #[arg(long)]
    threshold_strict: Option<f64>,

    /// Dissimilarity cutoff once the target is reached
    #[arg(long)]
    threshold_relaxed: Option<f64>,
}

impl From<SchedulerArgs> for ConfigOverrides {
    fn from(args: SchedulerArgs) -> Self {
        ConfigOverrides {
            buffer_size: args.buffer_size,
            comparison_scale: args.comparison_scale,
            adjustment_bound: args.adjustment_bound,
            duplicate_count: args.duplicate_count,
            threshold_strict: args.threshold_strict,
            threshold_relaxed: args.threshold_relaxed,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let quiet = matches!(cli.command, Commands::Fix { quiet: true, .. });
    let directive = if quiet { "framepace=warn" } else { "framepace=info" };

    // Initialize logging; stdout may carry the output stream
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Fix {
            input,
            output,
            options,
            config,
            quiet,
        } => cmd_fix(input, output, options, config, quiet).await,
        Commands::Probe { input } => cmd_probe(input),
        Commands::Defaults => cmd_defaults(),
    }
}

async fn cmd_fix(
    input: PathBuf,
    output: PathBuf,
    options: SchedulerArgs,
    config_path: Option<PathBuf>,
    quiet: bool,
) -> anyhow::Result<()> {
    let file_overrides = match &config_path {
        Some(path) => ConfigOverrides::from_toml_file(path)?,
        None => ConfigOverrides::default(),
    };
    let config = file_overrides.merge(options.into()).resolve();

    tracing::info!("Input: {}", input.display());
    tracing::info!("Output: {}", output.display());
    tracing::info!("Settings: {}", config);

    let cancel = Arc::new(AtomicBool::new(false));
    let progress = Arc::new(Progress::new());

    // Source and sink are opened on the worker thread that drives them
    let worker = {
        let cancel = cancel.clone();
        let progress = progress.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<RunSummary> {
            let source = open_source(&input)?;
            let info = source.info().clone();
            tracing::info!(
                "Stream: {} @ {} ({:?}{})",
                info.resolution,
                info.framerate,
                info.format,
                info.total_frames
                    .map(|n| format!(", {} frames", n))
                    .unwrap_or_default()
            );

            let mut sink = open_sink(&output, &info)?;
            let reporter = (!quiet).then(|| {
                ProgressReporter::spawn(
                    progress.clone(),
                    info.framerate.as_f64(),
                    Duration::from_secs(1),
                )
            });

            let mut reader = FrameReader::new(source, config.comparison_scale);
            let mut scheduler = Scheduler::new(config)
                .with_cancel_flag(cancel)
                .with_progress(progress);
            let result = scheduler.run(&mut reader, &mut sink);

            if let Some(reporter) = reporter {
                reporter.stop();
            }
            Ok(result?)
        })
    };

    // Ctrl+C only raises the flag; the scheduler flushes and returns
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, writing buffered frames...");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    let summary = worker.await?;
    signal.abort();
    let summary = summary?;

    if summary.under_target_records > 0 {
        tracing::warn!(
            "{} distinct frames were written with fewer than the target copies",
            summary.under_target_records
        );
    }
    tracing::info!(
        "Finished writing {} frames ({} distinct)",
        summary.frames_written,
        summary.distinct_frames
    );

    Ok(())
}

fn cmd_probe(input: PathBuf) -> anyhow::Result<()> {
    let source = open_source(&input)?;
    let info = source.info();

    println!("Stream: {}", input.display());
    println!("  Resolution: {}", info.resolution);
    println!("  Frame rate: {} ({}/{})", info.framerate, info.framerate.num, info.framerate.den);
    println!("  Pixel format: {:?}", info.format);
    if let Some(codec) = &info.codec {
        println!("  Codec: {}", codec);
    }
    match info.total_frames {
        Some(total) => println!("  Frames: {}", total),
        None => println!("  Frames: unknown"),
    }
    if let Some(duration) = info.duration_secs() {
        println!("  Duration: {:.2}s", duration);
    }
    if !info.passthrough.is_empty() {
        println!("  Stream tags: {}", info.passthrough.join(" "));
    }

    Ok(())
}

fn cmd_defaults() -> anyhow::Result<()> {
    let config = SchedulerConfig::default();

    println!("Default Settings");
    println!("================\n");

    let settings = [
        (
            "buffer_size",
            config.buffer_size.to_string(),
            "distinct frames held before the oldest is written",
        ),
        (
            "comparison_scale",
            config.comparison_scale.to_string(),
            "frames are shrunk by this factor before comparing",
        ),
        (
            "adjustment_bound",
            config.adjustment_bound.to_string(),
            "frames of drift tolerated before counts are trimmed or padded",
        ),
        (
            "duplicate_count",
            config.duplicate_count.to_string(),
            "copies each distinct frame needs to survive downsampling",
        ),
        (
            "threshold_strict",
            format!("{:.2}", config.threshold_strict),
            "match cutoff while a frame is below its copy target",
        ),
        (
            "threshold_relaxed",
            format!("{:.2}", config.threshold_relaxed),
            "match cutoff once it reached it (default: strict / 2)",
        ),
    ];

    for (name, value, description) in settings {
        println!("  {:<18} {:<6} {}", name, value, description);
    }

    println!("\nAll values must be positive; invalid values fall back to the default.");
    println!("Use 'framepace fix --config <file>' to load them from TOML.");

    Ok(())
}
