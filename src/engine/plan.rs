//! Single-use inference plan.
//!
//! A [`PatchPlan`] bundles everything the run phase needs for one image: the
//! window set, the patch transform and the padding policy. [`PatchPlan::run`]
//! takes the plan by value, so a plan cannot be run twice.

use std::fmt;
use std::sync::Arc;

use ndarray::{s, Array3, ArrayView3, Axis};
use tracing::{debug, info};

use crate::error::{InferenceError, PlanError, TransformError};
use crate::merge::Accumulator;
use crate::model::{CacheReleaseGuard, SegmentationModel};
use crate::transform::{divisible_pad, to_chw, PatchTransform};
use crate::window::{sliding_window, Window, WindowSet};

/// Padding value used for divisibility padding unless overridden.
pub const DEFAULT_PAD_VALUE: f32 = 0.0;

/// Planned sliding-window inference over one image.
///
/// # Example
///
/// ```
/// use ndarray::{Array3, Array4, ArrayView4};
/// use slidewin::engine::PatchPlan;
/// use slidewin::model::SegmentationModel;
/// use slidewin::ModelError;
///
/// struct Ones;
///
/// impl SegmentationModel for Ones {
///     fn predict(&self, input: ArrayView4<'_, f32>) -> Result<Array4<f32>, ModelError> {
///         let (n, _, h, w) = input.dim();
///         Ok(Array4::ones((n, 2, h, w)))
///     }
/// }
///
/// let image = Array3::<u8>::zeros((10, 10, 3));
/// let plan = PatchPlan::new((10, 10), (6, 6), 4).unwrap().with_size_divisor(4);
/// let merged = plan.run(&Ones, image.view()).unwrap();
/// assert_eq!(merged.dim(), (2, 10, 10));
/// ```
#[derive(Clone)]
pub struct PatchPlan {
    windows: WindowSet,
    transform: Option<Arc<dyn PatchTransform>>,
    size_divisor: Option<usize>,
    pad_value: f32,
}

impl PatchPlan {
    /// Plan windows for an image of `image_size = (height, width)`.
    pub fn new(
        image_size: (usize, usize),
        patch_size: (usize, usize),
        stride: usize,
    ) -> Result<Self, PlanError> {
        Ok(Self::from_windows(sliding_window(image_size, patch_size, stride)?))
    }

    /// Wrap an existing window set.
    pub fn from_windows(windows: WindowSet) -> Self {
        Self {
            windows,
            transform: None,
            size_divisor: None,
            pad_value: DEFAULT_PAD_VALUE,
        }
    }

    /// Set the patch transform. Without one, patches are only reordered to `(c, h, w)`.
    pub fn with_transform(mut self, transform: Arc<dyn PatchTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Pad every transformed patch so its height and width are multiples of
    /// `divisor`. A divisor of 0 or 1 disables padding.
    pub fn with_size_divisor(mut self, divisor: usize) -> Self {
        self.size_divisor = (divisor > 1).then_some(divisor);
        self
    }

    /// Value written into padded rows and columns.
    pub fn with_pad_value(mut self, value: f32) -> Self {
        self.pad_value = value;
        self
    }

    pub fn windows(&self) -> &WindowSet {
        &self.windows
    }

    /// Image size as `(height, width)`.
    pub fn image_size(&self) -> (usize, usize) {
        self.windows.image_size()
    }

    pub fn size_divisor(&self) -> Option<usize> {
        self.size_divisor
    }

    /// Run the model over every window and merge the results.
    ///
    /// `image` is laid out `(height, width, channels)` and must match the
    /// planned size. Windows are processed one at a time in plan order. The
    /// result is `(num_classes, height, width)`, each pixel holding the mean
    /// of the predictions of the windows covering it.
    ///
    /// # Errors
    ///
    /// Fails on the first window whose transform, prediction or merge fails.
    /// The plan is consumed either way.
    pub fn run<M, A>(self, model: &M, image: ArrayView3<'_, A>) -> Result<Array3<f32>, InferenceError>
    where
        M: SegmentationModel + ?Sized,
        A: Copy + Into<f32>,
    {
        let expected = self.windows.image_size();
        let (height, width, channels) = image.dim();
        if (height, width) != expected {
            return Err(InferenceError::ImageSizeMismatch {
                expected,
                actual: (height, width),
            });
        }

        let total = self.windows.len();
        info!(
            height,
            width,
            channels,
            windows = total,
            "Starting sliding-window inference"
        );

        let mut accumulator: Option<Accumulator> = None;
        for (index, &window) in self.windows.iter().enumerate() {
            let scores = self.infer_window(model, &image, window)?;

            let acc = accumulator
                .get_or_insert_with(|| Accumulator::new(scores.len_of(Axis(0)), height, width));
            acc.add(scores.view(), window)?;

            debug!(window = index + 1, total, "Merged window");
        }

        // An empty plan leaves every pixel uncovered, which finalize reports.
        let merged = accumulator
            .unwrap_or_else(|| Accumulator::new(0, height, width))
            .finalize()?;

        info!(classes = merged.len_of(Axis(0)), "Sliding-window inference complete");
        Ok(merged)
    }

    /// Crop, transform, pad and predict one window; returns `(num_classes, h, w)`
    /// scores cropped to the window.
    fn infer_window<M, A>(
        &self,
        model: &M,
        image: &ArrayView3<'_, A>,
        window: Window,
    ) -> Result<Array3<f32>, InferenceError>
    where
        M: SegmentationModel + ?Sized,
        A: Copy + Into<f32>,
    {
        let Window { x1, y1, x2, y2 } = window;
        let patch: Array3<f32> = image.slice(s![y1..y2, x1..x2, ..]).mapv(Into::into);

        let input = match &self.transform {
            Some(transform) => transform
                .apply(patch.view())
                .map_err(|source| InferenceError::Transform { window, source })?,
            None => to_chw(patch.view()),
        };

        let (win_h, win_w) = window.shape();
        let (_, in_h, in_w) = input.dim();
        if in_h < win_h || in_w < win_w {
            return Err(InferenceError::Transform {
                window,
                source: TransformError::OutputTooSmall {
                    expected: (win_h, win_w),
                    actual: (in_h, in_w),
                },
            });
        }

        let input = match self.size_divisor {
            Some(divisor) => divisible_pad(input, divisor, self.pad_value),
            None => input,
        }
        .insert_axis(Axis(0));

        let (_, in_channels, padded_height, padded_width) = input.dim();
        debug!(
            %window,
            channels = in_channels,
            padded_height,
            padded_width,
            "Predicting window"
        );

        let output = {
            let guard = CacheReleaseGuard::new(model);
            guard
                .model()
                .predict(input.view())
                .map_err(|source| InferenceError::Model { window, source })?
        };

        let (batch, _, out_h, out_w) = output.dim();
        if batch != 1 {
            return Err(InferenceError::OutputShape {
                window,
                message: format!("expected a batch of 1, got {batch}"),
            });
        }
        if out_h < win_h || out_w < win_w {
            return Err(InferenceError::OutputShape {
                window,
                message: format!(
                    "output is {out_h}x{out_w}, smaller than the {win_h}x{win_w} window"
                ),
            });
        }

        Ok(output
            .index_axis_move(Axis(0), 0)
            .slice_move(s![.., ..win_h, ..win_w]))
    }
}

impl fmt::Debug for PatchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchPlan")
            .field("windows", &self.windows.len())
            .field("image_size", &self.windows.image_size())
            .field("transform", &self.transform.is_some())
            .field("size_divisor", &self.size_divisor)
            .field("pad_value", &self.pad_value)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
