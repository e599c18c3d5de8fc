//! Dataset evaluation pipeline.
//!
//! Drives the inference engine over a folder of images, scores the
//! predictions against ground-truth masks and writes colourised predictions
//! in the background.
//!
//! # Architecture
//!
//! ```text
//! ImageFolder ──► load_image ──► Evaluator::predict_labels ──► argmax
//!      │                                                         │
//!      └──► load_mask ──► ColorMap::decode ──► ConfusionMatrix ◄─┤
//!                                                                │
//!                          VisualizationWriter (blocking pool) ◄─┘
//! ```
//!
//! # Components
//!
//! - [`ImageFolder`]: sorted images paired with masks by file stem
//! - [`ColorMap`]: class colour table, defaults to the iSAID palette
//! - [`ConfusionMatrix`]: per-class IoU and mean IoU
//! - [`Evaluator`]: per-image loop; failures are logged and skipped
//! - [`VisualizationWriter`]: fire-and-forget PNG writes

mod colormap;
mod dataset;
mod eval;
mod metric;
mod writer;

pub use colormap::{ColorMap, IGNORE_INDEX};
pub use dataset::{
    load_image, load_mask, rgb_array, ImageFolder, Sample, IMAGE_EXTENSIONS, RGB_CHANNELS,
};
pub use eval::{
    EvalOptions, EvalSummary, Evaluator, DEFAULT_PATCH_SIZE, DEFAULT_SIZE_DIVISOR, DEFAULT_STRIDE,
};
pub use metric::{argmax, ConfusionMatrix};
pub use writer::{write_labels, VisualizationWriter};
