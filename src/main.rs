//! slidewin - Sliding-window inference for large images.
//!
//! This binary runs folder evaluations and prints window plans.

use clap::Parser;
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slidewin::{
    config::{Cli, Command, EvalConfig, PlanConfig, PlanOutputFormat},
    pipeline::{ColorMap, EvalSummary, Evaluator, ImageFolder, VisualizationWriter},
    sliding_window, ImagePreprocess, PaletteModel,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Eval(config) => run_eval(config),
        Command::Plan(config) => run_plan(config),
    }
}

// =============================================================================
// Eval Command
// =============================================================================

fn run_eval(config: EvalConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let (patch_h, patch_w) = config.patch();
    info!("Configuration:");
    info!("  Images: {:?}", config.image_dir);
    match config.mask_dir {
        Some(ref dir) => info!("  Masks: {:?}", dir),
        None => warn!("  Masks: none - predictions will not be scored"),
    }
    if let Some(ref dir) = config.vis_dir {
        info!("  Visualisations: {:?} ({} writers)", dir, config.workers);
    }
    info!(
        "  Window: {}x{} patch, stride {}, size divisor {}",
        patch_h, patch_w, config.stride, config.size_divisor
    );

    // Visualisation writes run on the blocking pool, bounded by the worker count
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .max_blocking_threads(config.workers)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let preprocess = match ImagePreprocess::new(&config.mean, &config.std) {
        Ok(p) => p,
        Err(e) => {
            error!("Invalid normalization: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let colormap = Arc::new(ColorMap::isaid());
    let model = match PaletteModel::from_colors(colormap.colors(), &preprocess, config.temperature) {
        Ok(m) => m,
        Err(e) => {
            error!("Failed to build model: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let folder = match ImageFolder::open(&config.image_dir, config.mask_dir.as_deref()) {
        Ok(f) => f,
        Err(e) => {
            error!("Failed to read dataset: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("  Found {} image(s)", folder.len());

    let mut writer = match config.vis_dir {
        Some(ref dir) => {
            match VisualizationWriter::new(dir, Arc::clone(&colormap), runtime.handle().clone()) {
                Ok(w) => Some(w),
                Err(e) => {
                    error!("Failed to prepare visualisation output: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        None => None,
    };

    let mut evaluator = Evaluator::new(
        model,
        Arc::new(preprocess),
        Arc::clone(&colormap),
        config.eval_options(),
    );
    let mut summary = evaluator.evaluate(&folder, writer.as_mut());

    if let Some(writer) = writer {
        info!("Waiting for {} visualisation write(s)", writer.pending());
        summary.write_failures = runtime.block_on(writer.shutdown());
    }

    log_summary(&summary);

    if let Some(ref path) = config.summary {
        let json = match serde_json::to_string_pretty(&summary) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize summary: {}", e);
                return ExitCode::FAILURE;
            }
        };
        if let Err(e) = fs::write(path, json) {
            error!("Failed to write summary to {:?}: {}", path, e);
            return ExitCode::FAILURE;
        }
        info!("Summary written to {:?}", path);
    }

    if summary.images > 0 && summary.failed == summary.images {
        error!("Every image failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn log_summary(summary: &EvalSummary) {
    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!(
        "  Images: {} ({} scored, {} failed)",
        summary.images, summary.evaluated, summary.failed
    );
    if summary.evaluated > 0 {
        for (name, iou) in summary.class_names.iter().zip(&summary.ious) {
            info!("  {:<20} {:.4}", name, iou);
        }
        info!("  mIoU:            {:.4}", summary.miou);
        info!("  mIoU (no bg):    {:.4}", summary.miou_fg);
    }
    if summary.write_failures > 0 {
        warn!("  {} visualisation(s) failed to write", summary.write_failures);
    }
    info!("────────────────────────────────────────────────────────────────");
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "slidewin=debug"
    } else {
        "slidewin=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// =============================================================================
// Plan Command
// =============================================================================

fn run_plan(config: PlanConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let windows = match sliding_window((config.height, config.width), config.patch(), config.stride)
    {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let stats = windows.stats();

    match config.format {
        PlanOutputFormat::Summary => {
            println!("Sliding-window plan");
            println!("═══════════════════");
            println!("Image:     {}x{}", stats.height, stats.width);
            println!(
                "Patch:     {}x{}, stride {}",
                stats.patch_height, stats.patch_width, stats.stride
            );
            println!(
                "Windows:   {} ({} rows x {} cols)",
                stats.windows, stats.rows, stats.cols
            );
            println!(
                "Coverage:  {}..{} windows per pixel, {} pixel(s) overlapped",
                stats.min_coverage, stats.max_coverage, stats.overlapped_pixels
            );
            println!();
            for (index, window) in windows.iter().enumerate() {
                println!("  {:>4}  {}", index, window);
            }
        }
        PlanOutputFormat::Json => {
            let json = serde_json::json!({
                "stats": stats,
                "windows": windows.windows(),
            });
            match serde_json::to_string_pretty(&json) {
                Ok(s) => println!("{}", s),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}
