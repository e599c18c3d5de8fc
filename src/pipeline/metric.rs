//! Label extraction and intersection-over-union scoring.

use ndarray::{Array2, ArrayView2, ArrayView3, Axis, Zip};

use crate::error::PipelineError;

/// Per-pixel index of the highest-scoring class of a `(num_classes, h, w)` tensor.
///
/// Ties resolve to the lowest class index. Class indices are truncated to
/// `u8`, so at most 256 classes are meaningful.
pub fn argmax(scores: ArrayView3<'_, f32>) -> Array2<u8> {
    let (_, h, w) = scores.dim();
    let mut best_score = Array2::from_elem((h, w), f32::NEG_INFINITY);
    let mut labels = Array2::<u8>::zeros((h, w));

    for (class, plane) in scores.axis_iter(Axis(0)).enumerate() {
        Zip::from(&mut labels)
            .and(&mut best_score)
            .and(&plane)
            .for_each(|label, best, &score| {
                if score > *best {
                    *best = score;
                    *label = class as u8;
                }
            });
    }
    labels
}

/// Confusion matrix over `num_classes` classes, rows indexed by ground truth
/// and columns by prediction.
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    counts: Array2<u64>,
    ignore_index: u8,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize, ignore_index: u8) -> Self {
        Self {
            counts: Array2::zeros((num_classes, num_classes)),
            ignore_index,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn counts(&self) -> ArrayView2<'_, u64> {
        self.counts.view()
    }

    /// Accumulate one image.
    ///
    /// Pixels whose ground truth is the ignore index, or any label outside
    /// the class range, are skipped.
    pub fn update(
        &mut self,
        truth: ArrayView2<'_, u8>,
        prediction: ArrayView2<'_, u8>,
    ) -> Result<(), PipelineError> {
        if truth.dim() != prediction.dim() {
            return Err(PipelineError::MaskSizeMismatch {
                image: prediction.dim(),
                mask: truth.dim(),
            });
        }

        let n = self.num_classes();
        let ignore = self.ignore_index;
        let counts = &mut self.counts;
        Zip::from(&truth).and(&prediction).for_each(|&t, &p| {
            let (t, p) = (t as usize, p as usize);
            if t != ignore as usize && t < n && p < n {
                counts[[t, p]] += 1;
            }
        });
        Ok(())
    }

    /// Per-class IoU, or `None` for classes absent from both truth and prediction.
    pub fn ious(&self) -> Vec<Option<f64>> {
        let truth_totals = self.counts.sum_axis(Axis(1));
        let pred_totals = self.counts.sum_axis(Axis(0));
        (0..self.num_classes())
            .map(|k| {
                let tp = self.counts[[k, k]];
                let union = truth_totals[k] + pred_totals[k] - tp;
                (union > 0).then(|| tp as f64 / union as f64)
            })
            .collect()
    }

    /// Per-class IoU (absent classes reported as 0) and the mean over present classes.
    pub fn summary(&self) -> (Vec<f64>, f64) {
        let ious = self.ious();
        let miou = mean_present(ious.iter().copied());
        (ious.into_iter().map(|v| v.unwrap_or(0.0)).collect(), miou)
    }

    /// Mean IoU over present classes, excluding class 0.
    pub fn foreground_miou(&self) -> f64 {
        mean_present(self.ious().into_iter().skip(1))
    }
}

fn mean_present(values: impl Iterator<Item = Option<f64>>) -> f64 {
    let (total, count) = values
        .flatten()
        .fold((0.0, 0usize), |(total, count), v| (total + v, count + 1));
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

// =============================================================================
// Tests
// =============================================================================
