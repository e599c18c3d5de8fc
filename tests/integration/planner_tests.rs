//! Window planner integration tests.
//!
//! Tests verify, over a grid of image, patch and stride combinations:
//! - Every pixel is covered by at least one window
//! - Windows stay inside the image and are clipped only when the patch is larger
//! - Windows are listed row-major and start at the origin
//! - Invalid geometry is rejected

use std::collections::BTreeSet;

use slidewin::error::Axis;
use slidewin::{sliding_window, PlanError, Window};

fn geometry_grid() -> Vec<((usize, usize), (usize, usize), usize)> {
    let mut grid = Vec::new();
    for &height in &[1, 5, 10, 17, 32, 33] {
        for &width in &[1, 7, 10, 16, 31] {
            for &patch in &[1, 3, 6, 8, 16, 40] {
                for stride in 1..=patch {
                    grid.push(((height, width), (patch, patch), stride));
                }
            }
        }
    }
    grid.push(((100, 80), (32, 16), 8));
    grid.push(((20, 50), (7, 30), 5));
    grid
}

// =============================================================================
// Coverage
// =============================================================================

#[test]
fn test_every_pixel_covered() {
    for (image, patch, stride) in geometry_grid() {
        let set = sliding_window(image, patch, stride).unwrap();
        let counts = set.coverage_counts();
        assert_eq!(counts.dim(), image);
        assert!(
            counts.iter().all(|&c| c >= 1),
            "uncovered pixel for image {image:?} patch {patch:?} stride {stride}"
        );
        assert!(set.stats().min_coverage >= 1);
    }
}

#[test]
fn test_windows_within_bounds_and_sized() {
    for ((height, width), (patch_h, patch_w), stride) in geometry_grid() {
        let set = sliding_window((height, width), (patch_h, patch_w), stride).unwrap();
        for w in set.iter() {
            assert!(w.fits_within(height, width), "{w} outside {height}x{width}");
            assert_eq!(w.shape(), (patch_h.min(height), patch_w.min(width)));
        }
    }
}

#[test]
fn test_row_major_order_from_origin() {
    for (image, patch, stride) in geometry_grid() {
        let set = sliding_window(image, patch, stride).unwrap();
        let windows = set.windows();
        assert_eq!((windows[0].x1, windows[0].y1), (0, 0));

        let keys: Vec<(usize, usize)> = windows.iter().map(|w| (w.y1, w.x1)).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);

        // No duplicates
        let unique: BTreeSet<Window> = windows.iter().copied().collect();
        assert_eq!(unique.len(), windows.len());

        let last = windows[windows.len() - 1];
        assert_eq!((last.y2, last.x2), image);
    }
}

#[test]
fn test_window_count_is_grid_product() {
    for (image, patch, stride) in geometry_grid() {
        let set = sliding_window(image, patch, stride).unwrap();
        let stats = set.stats();
        assert_eq!(stats.windows, stats.rows * stats.cols);
    }
}

// =============================================================================
// Concrete Layouts
// =============================================================================

#[test]
fn test_ten_by_ten_overlap_counts() {
    let set = sliding_window((10, 10), (6, 6), 4).unwrap();
    assert_eq!(set.len(), 4);

    let counts = set.coverage_counts();
    for y in 0..10 {
        for x in 0..10 {
            let per_axis = |v: usize| if (4..6).contains(&v) { 2 } else { 1 };
            assert_eq!(counts[[y, x]], per_axis(y) * per_axis(x), "at ({x}, {y})");
        }
    }
    assert_eq!(counts[[5, 5]], 4);
    assert_eq!(counts[[0, 5]], 2);
    assert_eq!(counts[[0, 0]], 1);
}

#[test]
fn test_last_window_clamped_to_edge() {
    let set = sliding_window((10, 10), (4, 4), 4).unwrap();
    let starts: BTreeSet<usize> = set.iter().map(|w| w.x1).collect();
    assert_eq!(starts.into_iter().collect::<Vec<_>>(), vec![0, 4, 6]);
}

#[test]
fn test_patch_larger_than_image() {
    let set = sliding_window((5, 7), (896, 896), 512).unwrap();
    assert_eq!(set.windows(), &[Window::new(0, 0, 7, 5)]);
}

#[test]
fn test_isaid_default_geometry() {
    // 800x1024 image with the default evaluation settings
    let set = sliding_window((800, 1024), (896, 896), 512).unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(set.windows()[0], Window::new(0, 0, 896, 800));
    assert_eq!(set.windows()[1], Window::new(128, 0, 1024, 800));
}

// =============================================================================
// Rejected Geometry
// =============================================================================

#[test]
fn test_invalid_geometry() {
    assert_eq!(
        sliding_window((0, 10), (4, 4), 2).unwrap_err(),
        PlanError::EmptyImage {
            height: 0,
            width: 10
        }
    );
    assert!(matches!(
        sliding_window((10, 10), (0, 4), 2),
        Err(PlanError::ZeroPatch { .. })
    ));
    assert_eq!(
        sliding_window((10, 10), (4, 4), 0).unwrap_err(),
        PlanError::ZeroStride
    );
    assert_eq!(
        sliding_window((10, 20), (4, 4), 5).unwrap_err(),
        PlanError::StrideExceedsPatch {
            axis: Axis::Height,
            stride: 5,
            patch: 4,
            dim: 10
        }
    );
}

#[test]
fn test_large_stride_allowed_when_patch_spans_axis() {
    // Height is spanned by a single window, width is not
    assert!(sliding_window((4, 20), (8, 8), 6).is_ok());
    assert!(matches!(
        sliding_window((4, 20), (8, 8), 9),
        Err(PlanError::StrideExceedsPatch {
            axis: Axis::Width,
            ..
        })
    ));
}
