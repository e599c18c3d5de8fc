//! # slidewin
//!
//! Sliding-window inference for dense prediction models on images too large
//! to process in one pass.
//!
//! An image is tiled into overlapping fixed-size windows, the model is run on
//! one window at a time, and the per-window score maps are merged back into a
//! full-resolution result by averaging wherever windows overlap.
//!
//! ## Features
//!
//! - **Full coverage**: the planner clamps the last window on each axis to
//!   the image edge, so every pixel is predicted at least once
//! - **Order-independent merging**: overlapping predictions are summed
//!   exactly and divided by a per-pixel count, so the result is bit-identical
//!   for any window order
//! - **Bounded memory**: one window is in flight at a time and the model's
//!   cache is released after each
//! - **Evaluation driver**: iSAID-style folder evaluation with mean IoU and
//!   background visualisation writes
//!
//! ## Architecture
//!
//! - [`window`] - Window planning and geometry
//! - [`transform`] - Patch normalization and divisibility padding
//! - [`model`] - Model trait, cache-release guard and a reference model
//! - [`merge`] - Overlap-averaging accumulator
//! - [`engine`] - Single-use plans and the reusable inference engine
//! - [`pipeline`] - Dataset evaluation, metrics and visualisation
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust
//! use ndarray::{Array3, Array4, ArrayView4};
//! use slidewin::{ModelError, SegmentationModel, SlidingWindowInference};
//!
//! struct Constant;
//!
//! impl SegmentationModel for Constant {
//!     fn predict(&self, input: ArrayView4<'_, f32>) -> Result<Array4<f32>, ModelError> {
//!         let (n, _, h, w) = input.dim();
//!         Ok(Array4::from_elem((n, 4, h, w), 0.25))
//!     }
//! }
//!
//! let image = Array3::<u8>::zeros((1000, 1500, 3));
//! let mut engine = SlidingWindowInference::new().with_size_divisor(32);
//! engine.patch((1000, 1500), (896, 896), 512, None).unwrap();
//! let scores = engine.run(&Constant, image.view()).unwrap();
//! assert_eq!(scores.dim(), (4, 1000, 1500));
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod transform;
pub mod window;

// Re-export commonly used types
pub use config::{Cli, Command, EvalConfig, PlanConfig, PlanOutputFormat};
pub use engine::{EngineState, PatchPlan, SlidingWindowInference};
pub use error::{InferenceError, MergeError, ModelError, PipelineError, PlanError, TransformError};
pub use merge::Accumulator;
pub use model::{CacheReleaseGuard, PaletteModel, SegmentationModel};
pub use pipeline::{
    ColorMap, ConfusionMatrix, EvalOptions, EvalSummary, Evaluator, ImageFolder,
    VisualizationWriter,
};
pub use transform::{ImagePreprocess, PatchTransform, ToChw};
pub use window::{sliding_window, PlanStats, Window, WindowSet};
