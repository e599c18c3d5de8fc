//! Inference engine integration tests.
//!
//! Tests verify:
//! - A constant model produces the same constant everywhere
//! - Non-overlapping windows reconstruct an echoed image exactly
//! - Overlapping pixels hold the mean of the covering windows' predictions
//! - Merging does not depend on the order windows are added
//! - The engine lifecycle rejects stale or missing plans
//! - The model cache is released once per window, including on failure

use std::sync::Arc;

use ndarray::{Array3, ArrayView3};

use slidewin::transform::divisible_pad;
use slidewin::{
    sliding_window, Accumulator, EngineState, ImagePreprocess, InferenceError, MergeError,
    ModelError, PatchPlan, SlidingWindowInference, TransformError,
};

use super::test_utils::{ramp_image, CallIndexModel, ConstModel, EchoModel, TrackingModel};

// =============================================================================
// Merge Semantics
// =============================================================================

#[test]
fn test_constant_model_is_identity_everywhere() {
    let cases = [
        ((10, 10), (6, 6), 4),
        ((17, 31), (8, 8), 3),
        ((5, 5), (16, 16), 16),
        ((33, 12), (7, 5), 2),
    ];
    for (image_size, patch, stride) in cases {
        let image = Array3::<u8>::zeros((image_size.0, image_size.1, 3));
        let merged = PatchPlan::new(image_size, patch, stride)
            .unwrap()
            .with_size_divisor(8)
            .run(&ConstModel { value: 0.375, classes: 3 }, image.view())
            .unwrap();
        assert_eq!(merged.dim(), (3, image_size.0, image_size.1));
        assert!(merged.iter().all(|&v| v == 0.375), "case {image_size:?}");
    }
}

#[test]
fn test_non_overlapping_windows_are_exact() {
    let image = ramp_image(12, 16);
    let plan = PatchPlan::new((12, 16), (4, 4), 4).unwrap();
    assert_eq!(plan.windows().stats().max_coverage, 1);

    let merged = plan.run(&EchoModel, image.view()).unwrap();
    for ((_, y, x), &v) in merged.indexed_iter() {
        assert_eq!(v, image[[y, x, 0]]);
    }
}

#[test]
fn test_overlap_holds_mean_of_covering_windows() {
    // Windows in plan order: (0,0,6,6), (4,0,10,6), (0,4,6,10), (4,4,10,10)
    let image = ramp_image(10, 10);
    let merged = PatchPlan::new((10, 10), (6, 6), 4)
        .unwrap()
        .run(&CallIndexModel::default(), image.view())
        .unwrap();

    assert_eq!(merged[[0, 0, 0]], 0.0);
    assert_eq!(merged[[0, 0, 9]], 1.0);
    assert_eq!(merged[[0, 9, 0]], 2.0);
    assert_eq!(merged[[0, 9, 9]], 3.0);
    // Covered by windows 0 and 1
    assert_eq!(merged[[0, 0, 5]], 0.5);
    // Covered by windows 0 and 2
    assert_eq!(merged[[0, 5, 0]], 1.0);
    // Covered by all four
    assert_eq!(merged[[0, 5, 5]], 1.5);
}

#[test]
fn test_overlap_mean_matches_coverage() {
    let set = sliding_window((23, 19), (8, 8), 3).unwrap();
    let image = ramp_image(23, 19);
    let merged = PatchPlan::from_windows(set.clone())
        .run(&CallIndexModel::default(), image.view())
        .unwrap();

    for y in 0..23 {
        for x in 0..19 {
            let covering: Vec<f64> = set
                .iter()
                .enumerate()
                .filter(|(_, w)| w.contains(x, y))
                .map(|(i, _)| i as f64)
                .collect();
            let expected = covering.iter().sum::<f64>() / covering.len() as f64;
            assert!(
                (f64::from(merged[[0, y, x]]) - expected).abs() < 1e-4,
                "at ({x}, {y})"
            );
        }
    }
}

#[test]
fn test_merge_order_independent() {
    let set = sliding_window((20, 20), (8, 8), 5).unwrap();
    let predictions: Vec<Array3<f32>> = set
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let (h, wd) = w.shape();
            Array3::from_shape_fn((2, h, wd), |(c, y, x)| {
                ((i * 31 + c * 7 + y * 3 + x) % 17) as f32 * 0.173 - 1.1
            })
        })
        .collect();

    let merge = |order: &[usize]| {
        let mut acc = Accumulator::new(2, 20, 20);
        for &i in order {
            acc.add(predictions[i].view(), set.windows()[i]).unwrap();
        }
        acc.finalize().unwrap()
    };

    let forward: Vec<usize> = (0..set.len()).collect();
    let reverse: Vec<usize> = forward.iter().rev().copied().collect();
    let interleaved: Vec<usize> = forward
        .iter()
        .copied()
        .filter(|i| i % 2 == 1)
        .chain(forward.iter().copied().filter(|i| i % 2 == 0))
        .collect();

    let a = merge(&forward);
    for other in [merge(&reverse), merge(&interleaved)] {
        for (x, y) in a.iter().zip(other.iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }
}

#[test]
fn test_merge_order_independent_with_cancellation() {
    // Mixed-sign logits spanning many orders of magnitude, so that partial
    // sums cancel and small terms would be lost to rounding
    let set = sliding_window((12, 12), (8, 8), 2).unwrap();
    let magnitudes = [1e30f32, 20.0, 1e-8, 3.5, 1e-30, 7e12];
    let predictions: Vec<Array3<f32>> = set
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let (h, wd) = w.shape();
            Array3::from_shape_fn((2, h, wd), |(c, y, x)| {
                let m = magnitudes[(i + c + y * 5 + x) % magnitudes.len()];
                if (i + x + y) % 2 == 0 {
                    m
                } else {
                    -m
                }
            })
        })
        .collect();

    let merge = |order: &[usize]| {
        let mut acc = Accumulator::new(2, 12, 12);
        for &i in order {
            acc.add(predictions[i].view(), set.windows()[i]).unwrap();
        }
        acc.finalize().unwrap()
    };

    let forward: Vec<usize> = (0..set.len()).collect();
    let reverse: Vec<usize> = forward.iter().rev().copied().collect();
    let strided: Vec<usize> = (0..set.len()).map(|i| (i * 5) % set.len()).collect();
    let mut sorted = strided.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, forward, "stride must permute the windows");

    let a = merge(&forward);
    for other in [merge(&reverse), merge(&strided)] {
        for (x, y) in a.iter().zip(other.iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    // A pixel covered by +20, +1e-8 and -20 averages to a third of 1e-8
    let mut acc = Accumulator::new(1, 1, 3);
    let window = slidewin::Window::new(0, 0, 1, 1);
    for v in [20.0f32, -20.0, 1e-8] {
        acc.add(Array3::from_elem((1, 1, 1), v).view(), window)
            .unwrap();
    }
    acc.add(Array3::zeros((1, 1, 3)).view(), slidewin::Window::new(0, 0, 3, 1))
        .unwrap();
    let merged = acc.finalize().unwrap();
    assert_eq!(merged[[0, 0, 0]], (f64::from(1e-8f32) / 4.0) as f32);
}

#[test]
fn test_accumulator_reports_uncovered() {
    let mut acc = Accumulator::new(1, 4, 4);
    acc.add(Array3::<f32>::ones((1, 2, 4)).view(), slidewin::Window::new(0, 0, 4, 2))
        .unwrap();
    assert_eq!(
        acc.finalize().unwrap_err(),
        MergeError::Uncovered {
            x: 0,
            y: 2,
            uncovered: 8
        }
    );
}

// =============================================================================
// Padding and Transforms
// =============================================================================

#[test]
fn test_model_sees_divisible_inputs() {
    let image = Array3::<u8>::zeros((30, 45, 3));
    let model = TrackingModel::default();
    let merged = PatchPlan::new((30, 45), (20, 20), 10)
        .unwrap()
        .with_size_divisor(32)
        .with_transform(Arc::new(ImagePreprocess::default()))
        .run(&model, image.view())
        .unwrap();

    assert_eq!(merged.dim(), (2, 30, 45));
    for &(n, c, h, w) in model.input_shapes.borrow().iter() {
        assert_eq!((n, c), (1, 3));
        assert_eq!(h % 32, 0);
        assert_eq!(w % 32, 0);
    }
}

#[test]
fn test_transform_error_names_window() {
    let image = Array3::<u8>::zeros((8, 8, 3));
    // Preprocessing expects a single channel
    let transform = ImagePreprocess::new(&[0.0], &[1.0]).unwrap();
    let err = PatchPlan::new((8, 8), (4, 4), 4)
        .unwrap()
        .with_transform(Arc::new(transform))
        .run(&TrackingModel::default(), image.view())
        .unwrap_err();
    assert_eq!(
        err,
        InferenceError::Transform {
            window: slidewin::Window::new(0, 0, 4, 4),
            source: TransformError::ChannelMismatch {
                expected: 1,
                actual: 3
            }
        }
    );
}

#[test]
fn test_divisible_pad_anchored_at_origin() {
    let patch = Array3::from_shape_fn((1, 3, 5), |(_, y, x)| (y * 5 + x) as f32);
    let padded = divisible_pad(patch.clone(), 4, -1.0);
    assert_eq!(padded.dim(), (1, 4, 8));
    for ((c, y, x), &v) in padded.indexed_iter() {
        if y < 3 && x < 5 {
            assert_eq!(v, patch[[c, y, x]]);
        } else {
            assert_eq!(v, -1.0);
        }
    }
}

#[test]
fn test_closure_transform() {
    let invert = |patch: ArrayView3<'_, f32>| -> Result<Array3<f32>, TransformError> {
        Ok(patch.permuted_axes([2, 0, 1]).mapv(|v| 255.0 - v))
    };
    let image = Array3::<u8>::from_elem((6, 6, 1), 5);
    let merged = PatchPlan::new((6, 6), (4, 4), 2)
        .unwrap()
        .with_transform(Arc::new(invert))
        .run(&EchoModel, image.view())
        .unwrap();
    assert!(merged.iter().all(|&v| v == 250.0));
}

// =============================================================================
// Lifecycle and Resources
// =============================================================================

#[test]
fn test_engine_reused_across_images() {
    let mut engine = SlidingWindowInference::new().with_size_divisor(16);
    let model = ConstModel { value: 1.0, classes: 2 };

    for (h, w) in [(10, 10), (40, 25), (3, 50)] {
        let image = Array3::<u8>::zeros((h, w, 3));
        engine.patch((h, w), (16, 16), 8, None).unwrap();
        assert_eq!(engine.state(), EngineState::Configured);
        let merged = engine.run(&model, image.view()).unwrap();
        assert_eq!(merged.dim(), (2, h, w));
        assert_eq!(engine.state(), EngineState::Consumed);
    }
}

#[test]
fn test_run_without_fresh_plan_fails() {
    let mut engine = SlidingWindowInference::new();
    let image = Array3::<u8>::zeros((8, 8, 3));
    let model = ConstModel { value: 1.0, classes: 1 };

    assert_eq!(
        engine.run(&model, image.view()).unwrap_err(),
        InferenceError::NotConfigured
    );

    engine.patch((8, 8), (4, 4), 4, None).unwrap();
    engine.run(&model, image.view()).unwrap();
    assert_eq!(
        engine.run(&model, image.view()).unwrap_err(),
        InferenceError::NotConfigured
    );
}

#[test]
fn test_planned_size_must_match_image() {
    let mut engine = SlidingWindowInference::new();
    engine.patch((8, 8), (4, 4), 4, None).unwrap();
    let image = Array3::<u8>::zeros((8, 9, 3));
    assert_eq!(
        engine
            .run(&ConstModel { value: 1.0, classes: 1 }, image.view())
            .unwrap_err(),
        InferenceError::ImageSizeMismatch {
            expected: (8, 8),
            actual: (8, 9)
        }
    );
    assert_eq!(engine.state(), EngineState::Consumed);
}

#[test]
fn test_cache_released_per_window() {
    let image = Array3::<u8>::zeros((10, 10, 3));
    let model = TrackingModel::default();
    PatchPlan::new((10, 10), (6, 6), 4)
        .unwrap()
        .run(&model, image.view())
        .unwrap();
    assert_eq!(model.calls(), 4);
    assert_eq!(model.releases.get(), 4);
}

#[test]
fn test_model_failure_aborts_run_and_releases_cache() {
    let image = Array3::<u8>::zeros((10, 10, 3));
    let model = TrackingModel::failing_on(1);
    let err = PatchPlan::new((10, 10), (6, 6), 4)
        .unwrap()
        .run(&model, image.view())
        .unwrap_err();

    assert_eq!(
        err,
        InferenceError::Model {
            window: slidewin::Window::new(4, 0, 10, 6),
            source: ModelError::Backend("out of device memory".to_string())
        }
    );
    // The failing window is the last one attempted
    assert_eq!(model.calls(), 2);
    assert_eq!(model.releases.get(), 2);
}
