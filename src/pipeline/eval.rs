//! Dataset evaluation loop.

use std::sync::Arc;

use ndarray::{Array2, Array3};
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::SlidingWindowInference;
use crate::error::{InferenceError, PipelineError};
use crate::model::SegmentationModel;
use crate::transform::PatchTransform;

use super::colormap::{ColorMap, IGNORE_INDEX};
use super::dataset::{load_image, load_mask, ImageFolder, Sample};
use super::metric::{argmax, ConfusionMatrix};
use super::writer::VisualizationWriter;

/// Default square patch side.
pub const DEFAULT_PATCH_SIZE: usize = 896;

/// Default window stride.
pub const DEFAULT_STRIDE: usize = 512;

/// Default divisor model inputs are padded to.
pub const DEFAULT_SIZE_DIVISOR: usize = 32;

/// Sliding-window settings shared by every image of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOptions {
    /// Patch size as `(height, width)`
    pub patch_size: (usize, usize),
    pub stride: usize,
    pub size_divisor: usize,
    /// Ground-truth label excluded from scoring
    pub ignore_index: u8,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            patch_size: (DEFAULT_PATCH_SIZE, DEFAULT_PATCH_SIZE),
            stride: DEFAULT_STRIDE,
            size_divisor: DEFAULT_SIZE_DIVISOR,
            ignore_index: IGNORE_INDEX,
        }
    }
}

/// Result of evaluating a folder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalSummary {
    /// Images found in the folder
    pub images: usize,
    /// Images skipped because loading or inference failed
    pub failed: usize,
    /// Images scored against a mask
    pub evaluated: usize,
    pub class_names: Vec<String>,
    pub ious: Vec<f64>,
    pub miou: f64,
    /// Mean IoU excluding the background class
    pub miou_fg: f64,
    /// Visualisations that could not be written; set once the writer is shut down
    pub write_failures: usize,
}

/// Runs sliding-window inference over a dataset and scores the predictions.
pub struct Evaluator<M> {
    engine: SlidingWindowInference,
    model: M,
    transform: Arc<dyn PatchTransform>,
    colormap: Arc<ColorMap>,
    options: EvalOptions,
}

impl<M: SegmentationModel> Evaluator<M> {
    pub fn new(
        model: M,
        transform: Arc<dyn PatchTransform>,
        colormap: Arc<ColorMap>,
        options: EvalOptions,
    ) -> Self {
        Self {
            engine: SlidingWindowInference::new().with_size_divisor(options.size_divisor),
            model,
            transform,
            colormap,
            options,
        }
    }

    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Predict a label map for one `(h, w, 3)` image.
    pub fn predict_labels(&mut self, image: &Array3<u8>) -> Result<Array2<u8>, PipelineError> {
        let (height, width, _) = image.dim();
        self.engine
            .patch(
                (height, width),
                self.options.patch_size,
                self.options.stride,
                Some(Arc::clone(&self.transform)),
            )
            .map_err(InferenceError::from)?;
        let scores = self.engine.run(&self.model, image.view())?;
        Ok(argmax(scores.view()))
    }

    /// Evaluate every image in `folder`.
    ///
    /// Images that fail to load or infer are logged and skipped. When a
    /// writer is given, each prediction is queued for visualisation; the
    /// caller is responsible for shutting the writer down.
    pub fn evaluate(
        &mut self,
        folder: &ImageFolder,
        mut writer: Option<&mut VisualizationWriter>,
    ) -> EvalSummary {
        let total = folder.len();
        let mut matrix = ConfusionMatrix::new(self.colormap.len(), self.options.ignore_index);
        let mut failed = 0;
        let mut evaluated = 0;

        for (index, sample) in folder.iter().enumerate() {
            match self.process(sample, index, total, &mut matrix, writer.as_deref_mut()) {
                Ok(scored) => evaluated += usize::from(scored),
                Err(e) => {
                    warn!("Skipping {:?}: {}", sample.image_path, e);
                    failed += 1;
                }
            }
        }

        let (ious, miou) = matrix.summary();
        EvalSummary {
            images: total,
            failed,
            evaluated,
            class_names: self.colormap.names().to_vec(),
            ious,
            miou,
            miou_fg: matrix.foreground_miou(),
            write_failures: 0,
        }
    }

    /// Returns whether the sample was scored.
    fn process(
        &mut self,
        sample: &Sample,
        index: usize,
        total: usize,
        matrix: &mut ConfusionMatrix,
        writer: Option<&mut VisualizationWriter>,
    ) -> Result<bool, PipelineError> {
        let image = load_image(&sample.image_path)?;
        let (height, width, _) = image.dim();
        info!("Progress - [{} / {}] size = ({}, {})", index + 1, total, height, width);

        // Load the mask first so a bad mask fails before inference
        let truth = match &sample.mask_path {
            Some(path) => Some(load_mask(path, &self.colormap)?),
            None => None,
        };
        if let Some(truth) = &truth {
            if truth.dim() != (height, width) {
                return Err(PipelineError::MaskSizeMismatch {
                    image: (height, width),
                    mask: truth.dim(),
                });
            }
        }

        let labels = self.predict_labels(&image)?;

        let scored = match &truth {
            Some(truth) => {
                matrix.update(truth.view(), labels.view())?;
                true
            }
            None => false,
        };

        if let Some(writer) = writer {
            writer.submit(labels, &sample.file_name());
        }
        Ok(scored)
    }
}
