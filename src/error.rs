use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::window::Window;

/// Image axis, used to report which dimension a geometry check failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Height,
    Width,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Height => f.write_str("height"),
            Axis::Width => f.write_str("width"),
        }
    }
}

/// Errors raised while planning the window set for an image
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// Image has a zero-length dimension
    #[error("Image must be non-empty, got {height}x{width}")]
    EmptyImage { height: usize, width: usize },

    /// Patch has a zero-length dimension
    #[error("Patch size must be positive, got {height}x{width}")]
    ZeroPatch { height: usize, width: usize },

    /// Stride of zero would never advance
    #[error("Stride must be positive")]
    ZeroStride,

    /// Stride skips pixels between consecutive windows on this axis
    #[error(
        "Stride {stride} exceeds patch {axis} {patch} on an axis of length {dim}; \
         windows would leave gaps"
    )]
    StrideExceedsPatch {
        axis: Axis,
        stride: usize,
        patch: usize,
        dim: usize,
    },
}

/// Errors raised by a patch transform
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// Transform was constructed with unusable parameters
    #[error("Invalid transform parameter: {message}")]
    InvalidParameter { message: String },

    /// Patch channel count does not match what the transform expects
    #[error("Channel mismatch: expected {expected} channels, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    /// Patch has no pixels
    #[error("Cannot transform an empty patch")]
    EmptyPatch,

    /// Transform output is smaller than the patch it was given
    #[error("Transform output {actual:?} is smaller than the patch {expected:?}")]
    OutputTooSmall {
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

/// Errors raised by a prediction model
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Input tensor is not something the model can consume
    #[error("Invalid model input: {message}")]
    InvalidInput { message: String },

    /// Failure inside the model backend (device exhaustion, runtime error)
    #[error("Model backend error: {0}")]
    Backend(String),
}

/// Errors raised while accumulating or merging window predictions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// Window extends past the accumulation buffer
    #[error("Window {window} lies outside the {height}x{width} accumulation buffer")]
    WindowOutOfBounds {
        window: Window,
        height: usize,
        width: usize,
    },

    /// Prediction spatial shape differs from its window
    #[error("Prediction shape {actual:?} does not match window shape {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Prediction class count differs from the buffer's class count
    #[error("Prediction has {actual} classes, accumulator expects {expected}")]
    ClassCountMismatch { expected: usize, actual: usize },

    /// A pixel received no prediction; the window set did not cover the image
    #[error("Pixel ({x}, {y}) was never covered by a window ({uncovered} uncovered pixels)")]
    Uncovered { x: usize, y: usize, uncovered: usize },
}

/// Errors raised by the sliding-window inference engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    /// `run` was called without a fresh planning call
    #[error("Inference engine is not configured: call patch() before run()")]
    NotConfigured,

    /// Image passed to `run` differs from the planned size
    #[error("Image size {actual:?} does not match planned size {expected:?}")]
    ImageSizeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Window planning failed
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Transform failed for a window
    #[error("Transform failed for window {window}: {source}")]
    Transform {
        window: Window,
        #[source]
        source: TransformError,
    },

    /// Model failed for a window
    #[error("Model failed for window {window}: {source}")]
    Model {
        window: Window,
        #[source]
        source: ModelError,
    },

    /// Model output cannot be cropped back to the window
    #[error("Unexpected model output for window {window}: {message}")]
    OutputShape { window: Window, message: String },

    /// Merging failed
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),
}

/// Errors raised by the evaluation driver for a single image or output
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Filesystem error
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Image could not be decoded or encoded
    #[error("Image error on {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Mask and image dimensions disagree
    #[error("Mask size {mask:?} does not match image size {image:?}")]
    MaskSizeMismatch {
        image: (usize, usize),
        mask: (usize, usize),
    },

    /// Inference on the image failed
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// Background output task failed to complete
    #[error("Writer task failed: {0}")]
    Writer(String),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        PipelineError::Image {
            path: path.into(),
            source,
        }
    }
}
