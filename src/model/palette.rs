//! Nearest-colour reference model.
//!
//! Scores every pixel by how close its colour is to a fixed prototype colour
//! per class. It needs no weights, which makes it useful for smoke-testing the
//! evaluation pipeline on colour-coded imagery and as a deterministic model in
//! tests.

use ndarray::{Array4, ArrayView4, Axis};

use crate::error::ModelError;
use crate::transform::ImagePreprocess;

/// Default softmax temperature, in squared normalized-distance units.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Softmax over negative squared distance to per-class prototype colours.
///
/// Prototypes live in the same space as the model input, so they are passed
/// through the same normalization the patch transform applies.
#[derive(Debug, Clone)]
pub struct PaletteModel {
    /// `prototypes[k]` is the normalized colour of class `k`
    prototypes: Vec<Vec<f32>>,
    temperature: f32,
}

impl PaletteModel {
    /// Create a model from prototypes already expressed in input space.
    pub fn new(prototypes: Vec<Vec<f32>>, temperature: f32) -> Result<Self, ModelError> {
        let channels = match prototypes.first() {
            Some(p) if !p.is_empty() => p.len(),
            _ => {
                return Err(ModelError::InvalidInput {
                    message: "palette model needs at least one non-empty prototype".to_string(),
                })
            }
        };
        if prototypes.iter().any(|p| p.len() != channels) {
            return Err(ModelError::InvalidInput {
                message: "all prototypes must have the same number of channels".to_string(),
            });
        }
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(ModelError::InvalidInput {
                message: format!("temperature must be positive and finite, got {temperature}"),
            });
        }
        Ok(Self {
            prototypes,
            temperature,
        })
    }

    /// Create a model from raw RGB class colours, normalized with `preprocess`.
    pub fn from_colors(
        colors: &[[u8; 3]],
        preprocess: &ImagePreprocess,
        temperature: f32,
    ) -> Result<Self, ModelError> {
        let prototypes = colors
            .iter()
            .map(|rgb| {
                let raw: Vec<f32> = rgb.iter().map(|&v| f32::from(v)).collect();
                preprocess
                    .normalize_pixel(&raw)
                    .map_err(|e| ModelError::InvalidInput {
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(prototypes, temperature)
    }

    pub fn num_classes(&self) -> usize {
        self.prototypes.len()
    }

    pub fn channels(&self) -> usize {
        self.prototypes[0].len()
    }
}

impl super::SegmentationModel for PaletteModel {
    fn predict(&self, input: ArrayView4<'_, f32>) -> Result<Array4<f32>, ModelError> {
        let (n, c, h, w) = input.dim();
        if c != self.channels() {
            return Err(ModelError::InvalidInput {
                message: format!("expected {} channels, got {}", self.channels(), c),
            });
        }

        let k = self.num_classes();
        let mut out = Array4::<f32>::zeros((n, k, h, w));
        let mut logits = vec![0.0f32; k];

        for (sample, mut scores) in input.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
            for y in 0..h {
                for x in 0..w {
                    for (logit, proto) in logits.iter_mut().zip(&self.prototypes) {
                        let dist: f32 = proto
                            .iter()
                            .enumerate()
                            .map(|(ch, p)| {
                                let d = sample[[ch, y, x]] - p;
                                d * d
                            })
                            .sum();
                        *logit = -dist / self.temperature;
                    }

                    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                    let mut total = 0.0;
                    for logit in logits.iter_mut() {
                        *logit = (*logit - max).exp();
                        total += *logit;
                    }
                    for (class, logit) in logits.iter().enumerate() {
                        scores[[class, y, x]] = logit / total;
                    }
                }
            }
        }

        Ok(out)
    }
}
