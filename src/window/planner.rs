//! Sliding-window planning.
//!
//! Each axis is tiled independently and the two axes' start offsets are
//! combined row-major. Starts advance by `stride` while the window still fits;
//! if the last fitting window stops short of the image edge, one more window
//! is added flush against the edge. That final window can overlap its
//! predecessor by more than `patch - stride`; averaging during merge absorbs
//! the extra overlap.

use crate::error::{Axis, PlanError};

use super::geometry::{Window, WindowSet};

/// Plan the windows covering an image.
///
/// # Arguments
///
/// * `image_size` - Image size as `(height, width)`
/// * `patch_size` - Window size as `(height, width)`
/// * `stride` - Offset between consecutive window origins on both axes
///
/// A patch larger than the image is clipped to the image on that axis.
///
/// # Errors
///
/// Returns an error if any size is zero, or if `stride` exceeds the patch on
/// an axis the patch does not span in a single window.
///
/// # Example
///
/// ```
/// use slidewin::window::{sliding_window, Window};
///
/// let set = sliding_window((10, 10), (6, 6), 4).unwrap();
/// assert_eq!(
///     set.windows(),
///     &[
///         Window::new(0, 0, 6, 6),
///         Window::new(4, 0, 10, 6),
///         Window::new(0, 4, 6, 10),
///         Window::new(4, 4, 10, 10),
///     ]
/// );
/// ```
pub fn sliding_window(
    image_size: (usize, usize),
    patch_size: (usize, usize),
    stride: usize,
) -> Result<WindowSet, PlanError> {
    let (height, width) = image_size;
    let (patch_h, patch_w) = patch_size;

    if height == 0 || width == 0 {
        return Err(PlanError::EmptyImage { height, width });
    }
    if patch_h == 0 || patch_w == 0 {
        return Err(PlanError::ZeroPatch {
            height: patch_h,
            width: patch_w,
        });
    }
    if stride == 0 {
        return Err(PlanError::ZeroStride);
    }

    let ys = axis_spans(Axis::Height, height, patch_h, stride)?;
    let xs = axis_spans(Axis::Width, width, patch_w, stride)?;

    let windows = ys
        .iter()
        .flat_map(|&(y1, y2)| xs.iter().map(move |&(x1, x2)| Window::new(x1, y1, x2, y2)))
        .collect();

    Ok(WindowSet::new(windows, height, width, patch_size, stride))
}

/// Half-open `(start, end)` spans tiling one axis of length `dim`.
pub(crate) fn axis_spans(
    axis: Axis,
    dim: usize,
    patch: usize,
    stride: usize,
) -> Result<Vec<(usize, usize)>, PlanError> {
    if patch >= dim {
        return Ok(vec![(0, dim)]);
    }
    if stride > patch {
        return Err(PlanError::StrideExceedsPatch {
            axis,
            stride,
            patch,
            dim,
        });
    }

    let mut spans: Vec<(usize, usize)> = (0..)
        .map(|i| i * stride)
        .take_while(|&start| start + patch <= dim)
        .map(|start| (start, start + patch))
        .collect();

    // patch < dim, so the first candidate always fits
    if spans.last().map_or(true, |&(_, end)| end != dim) {
        spans.push((dim - patch, dim));
    }

    Ok(spans)
}

// =============================================================================
// Tests
// =============================================================================
