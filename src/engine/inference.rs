//! Reusable sliding-window inference engine.

use std::fmt;
use std::sync::Arc;

use ndarray::{Array3, ArrayView3};
use tracing::debug;

use crate::error::{InferenceError, PlanError};
use crate::model::SegmentationModel;
use crate::transform::PatchTransform;
use crate::window::WindowSet;

use super::plan::{PatchPlan, DEFAULT_PAD_VALUE};

// =============================================================================
// Engine State
// =============================================================================

/// Lifecycle of a [`SlidingWindowInference`] engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No plan has been made yet
    Unconfigured,
    /// A plan is ready to run
    Configured,
    /// The last plan has been run (successfully or not) and cleared
    Consumed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Unconfigured => "unconfigured",
            EngineState::Configured => "configured",
            EngineState::Consumed => "consumed",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Sliding Window Inference
// =============================================================================

/// Sliding-window inference engine reused across images.
///
/// Each image goes through one planning call ([`patch`](Self::patch)) and
/// one [`run`](Self::run). Running clears the plan, so a second `run`
/// without a new planning call fails with
/// [`InferenceError::NotConfigured`].
///
/// For single-image use where the compiler should enforce the one-run rule,
/// use [`PatchPlan`] directly.
///
/// # Example
///
/// ```ignore
/// use slidewin::engine::SlidingWindowInference;
///
/// let mut engine = SlidingWindowInference::new().with_size_divisor(32);
/// for image in images {
///     let (h, w, _) = image.dim();
///     engine.patch((h, w), (896, 896), 512, Some(transform.clone()))?;
///     let scores = engine.run(&model, image.view())?;
/// }
/// ```
pub struct SlidingWindowInference {
    plan: Option<PatchPlan>,
    state: EngineState,
    size_divisor: usize,
    pad_value: f32,
}

impl SlidingWindowInference {
    /// Create an unconfigured engine without divisibility padding.
    pub fn new() -> Self {
        Self {
            plan: None,
            state: EngineState::Unconfigured,
            size_divisor: 0,
            pad_value: DEFAULT_PAD_VALUE,
        }
    }

    /// Pad every model input to a multiple of `divisor` (0 or 1 disables).
    pub fn with_size_divisor(mut self, divisor: usize) -> Self {
        self.size_divisor = divisor;
        self
    }

    /// Value written into padded rows and columns.
    pub fn with_pad_value(mut self, value: f32) -> Self {
        self.pad_value = value;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Windows of the pending plan, if configured.
    pub fn windows(&self) -> Option<&WindowSet> {
        self.plan.as_ref().map(PatchPlan::windows)
    }

    /// Plan windows for the next image.
    ///
    /// Replaces any pending plan. On error the engine is left without a
    /// plan.
    pub fn patch(
        &mut self,
        image_size: (usize, usize),
        patch_size: (usize, usize),
        stride: usize,
        transform: Option<Arc<dyn PatchTransform>>,
    ) -> Result<&mut Self, PlanError> {
        self.plan = None;
        let plan = match PatchPlan::new(image_size, patch_size, stride) {
            Ok(plan) => plan,
            Err(e) => {
                self.state = EngineState::Unconfigured;
                return Err(e);
            }
        };

        let plan = plan
            .with_size_divisor(self.size_divisor)
            .with_pad_value(self.pad_value);
        let plan = match transform {
            Some(t) => plan.with_transform(t),
            None => plan,
        };

        debug!(
            windows = plan.windows().len(),
            height = image_size.0,
            width = image_size.1,
            "Planned sliding windows"
        );
        self.plan = Some(plan);
        self.state = EngineState::Configured;
        Ok(self)
    }

    /// Run the pending plan on `image` and return the merged scores.
    ///
    /// The plan is cleared before any window is processed, so the engine
    /// needs a fresh [`patch`](Self::patch) call afterwards regardless of
    /// the outcome.
    pub fn run<M, A>(&mut self, model: &M, image: ArrayView3<'_, A>) -> Result<Array3<f32>, InferenceError>
    where
        M: SegmentationModel + ?Sized,
        A: Copy + Into<f32>,
    {
        let plan = self.plan.take().ok_or(InferenceError::NotConfigured)?;
        self.state = EngineState::Consumed;
        plan.run(model, image)
    }
}

impl Default for SlidingWindowInference {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SlidingWindowInference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingWindowInference")
            .field("state", &self.state)
            .field("plan", &self.plan)
            .field("size_divisor", &self.size_divisor)
            .field("pad_value", &self.pad_value)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
