//! Command-line configuration for slidewin.
//!
//! Two subcommands are exposed:
//!
//! - `eval`: run sliding-window inference over an image folder, score the
//!   predictions against masks and optionally write visualisations
//! - `plan`: print the window plan for an image size without running a model
//!
//! # Environment Variables
//!
//! Every `eval` option can also be set with a `SLIDEWIN_` prefixed variable:
//!
//! - `SLIDEWIN_IMAGE_DIR` - Folder of input images (required)
//! - `SLIDEWIN_MASK_DIR` - Folder of ground-truth masks
//! - `SLIDEWIN_VIS_DIR` - Folder for colourised predictions
//! - `SLIDEWIN_SUMMARY` - Path of the JSON summary to write
//! - `SLIDEWIN_PATCH_SIZE` - Patch side (default: 896)
//! - `SLIDEWIN_PATCH_WIDTH` - Patch width for non-square patches (default: patch size)
//! - `SLIDEWIN_STRIDE` - Window stride (default: 512)
//! - `SLIDEWIN_SIZE_DIVISOR` - Model input divisor (default: 32)
//! - `SLIDEWIN_MEAN` / `SLIDEWIN_STD` - Comma-separated RGB normalization constants
//! - `SLIDEWIN_TEMPERATURE` - Palette model softmax temperature (default: 0.1)
//! - `SLIDEWIN_IGNORE_INDEX` - Mask label excluded from scoring (default: 255)
//! - `SLIDEWIN_WORKERS` - Concurrent visualisation writers (default: 4)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::model::DEFAULT_TEMPERATURE;
use crate::pipeline::{
    EvalOptions, DEFAULT_PATCH_SIZE, DEFAULT_SIZE_DIVISOR, DEFAULT_STRIDE, IGNORE_INDEX,
    RGB_CHANNELS,
};
use crate::transform::{DEFAULT_MEAN, DEFAULT_STD};

// =============================================================================
// Default Values
// =============================================================================

/// Default number of concurrent visualisation writers.
pub const DEFAULT_WORKERS: usize = 4;

// =============================================================================
// CLI Structure
// =============================================================================

/// slidewin - Sliding-window inference for large images.
#[derive(Parser, Debug, Clone)]
#[command(name = "slidewin")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Consume the CLI and return the selected command.
    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Evaluate a segmentation model over a folder of images
    Eval(EvalConfig),

    /// Print the sliding-window plan for an image size
    Plan(PlanConfig),
}

// =============================================================================
// Eval Command
// =============================================================================

/// Configuration for the `eval` command.
#[derive(Args, Debug, Clone)]
pub struct EvalConfig {
    // =========================================================================
    // Dataset
    // =========================================================================
    /// Folder of input images.
    #[arg(long, env = "SLIDEWIN_IMAGE_DIR")]
    pub image_dir: PathBuf,

    /// Folder of ground-truth masks, matched to images by file stem.
    ///
    /// Without masks, predictions are still produced but nothing is scored.
    #[arg(long, env = "SLIDEWIN_MASK_DIR")]
    pub mask_dir: Option<PathBuf>,

    /// Folder to write colourised predictions into.
    #[arg(long, env = "SLIDEWIN_VIS_DIR")]
    pub vis_dir: Option<PathBuf>,

    /// Write the evaluation summary as JSON to this path.
    #[arg(long, env = "SLIDEWIN_SUMMARY")]
    pub summary: Option<PathBuf>,

    // =========================================================================
    // Sliding Window
    // =========================================================================
    /// Patch height (and width, unless --patch-width is given).
    #[arg(long, default_value_t = DEFAULT_PATCH_SIZE, env = "SLIDEWIN_PATCH_SIZE")]
    pub patch_size: usize,

    /// Patch width, for non-square patches.
    #[arg(long, env = "SLIDEWIN_PATCH_WIDTH")]
    pub patch_width: Option<usize>,

    /// Distance between consecutive window origins.
    #[arg(long, default_value_t = DEFAULT_STRIDE, env = "SLIDEWIN_STRIDE")]
    pub stride: usize,

    /// Pad model inputs to a multiple of this value (0 or 1 disables).
    #[arg(long, default_value_t = DEFAULT_SIZE_DIVISOR, env = "SLIDEWIN_SIZE_DIVISOR")]
    pub size_divisor: usize,

    // =========================================================================
    // Preprocessing and Model
    // =========================================================================
    /// Per-channel mean subtracted from pixel values.
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_MEAN, env = "SLIDEWIN_MEAN")]
    pub mean: Vec<f32>,

    /// Per-channel standard deviation pixel values are divided by.
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_STD, env = "SLIDEWIN_STD")]
    pub std: Vec<f32>,

    /// Softmax temperature of the palette model.
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE, env = "SLIDEWIN_TEMPERATURE")]
    pub temperature: f32,

    // =========================================================================
    // Scoring and Output
    // =========================================================================
    /// Mask label excluded from scoring.
    #[arg(long, default_value_t = IGNORE_INDEX, env = "SLIDEWIN_IGNORE_INDEX")]
    pub ignore_index: u8,

    /// Maximum number of visualisations written concurrently.
    #[arg(long, default_value_t = DEFAULT_WORKERS, env = "SLIDEWIN_WORKERS")]
    pub workers: usize,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl EvalConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        validate_window(self.patch_size, self.patch_width, self.stride)?;

        if self.mean.len() != self.std.len() {
            return Err(format!(
                "mean has {} values but std has {}",
                self.mean.len(),
                self.std.len()
            ));
        }
        // Images are always decoded to RGB
        if self.mean.len() != RGB_CHANNELS {
            return Err(format!(
                "mean and std need {RGB_CHANNELS} values (one per RGB channel), got {}",
                self.mean.len()
            ));
        }
        if self.std.iter().any(|&s| s == 0.0 || !s.is_finite()) {
            return Err("std values must be finite and non-zero".to_string());
        }

        if !(self.temperature > 0.0 && self.temperature.is_finite()) {
            return Err("temperature must be a positive number".to_string());
        }

        if self.workers == 0 {
            return Err("workers must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Patch size as `(height, width)`.
    pub fn patch(&self) -> (usize, usize) {
        (self.patch_size, self.patch_width.unwrap_or(self.patch_size))
    }

    /// Sliding-window settings for the evaluator.
    pub fn eval_options(&self) -> EvalOptions {
        EvalOptions {
            patch_size: self.patch(),
            stride: self.stride,
            size_divisor: self.size_divisor,
            ignore_index: self.ignore_index,
        }
    }
}

// =============================================================================
// Plan Command
// =============================================================================

/// Output format for the `plan` command.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlanOutputFormat {
    /// Human-readable statistics and window list
    #[default]
    Summary,
    /// JSON object with statistics and windows
    Json,
}

/// Configuration for the `plan` command.
#[derive(Args, Debug, Clone)]
pub struct PlanConfig {
    /// Image height in pixels.
    #[arg(long)]
    pub height: usize,

    /// Image width in pixels.
    #[arg(long)]
    pub width: usize,

    /// Patch height (and width, unless --patch-width is given).
    #[arg(long, default_value_t = DEFAULT_PATCH_SIZE)]
    pub patch_size: usize,

    /// Patch width, for non-square patches.
    #[arg(long)]
    pub patch_width: Option<usize>,

    /// Distance between consecutive window origins.
    #[arg(long, default_value_t = DEFAULT_STRIDE)]
    pub stride: usize,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = PlanOutputFormat::Summary)]
    pub format: PlanOutputFormat,
}

impl PlanConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.height == 0 || self.width == 0 {
            return Err("height and width must be greater than 0".to_string());
        }
        validate_window(self.patch_size, self.patch_width, self.stride)
    }

    /// Patch size as `(height, width)`.
    pub fn patch(&self) -> (usize, usize) {
        (self.patch_size, self.patch_width.unwrap_or(self.patch_size))
    }
}

fn validate_window(patch_size: usize, patch_width: Option<usize>, stride: usize) -> Result<(), String> {
    if patch_size == 0 || patch_width == Some(0) {
        return Err("patch size must be greater than 0".to_string());
    }
    if stride == 0 {
        return Err("stride must be greater than 0".to_string());
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
