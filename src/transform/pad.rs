//! Divisibility padding.

use ndarray::{s, Array3};

/// Smallest multiple of `divisor` that is `>= len`. A divisor of 0 or 1 leaves `len` unchanged.
#[inline]
pub fn padded_len(len: usize, divisor: usize) -> usize {
    if divisor <= 1 {
        return len;
    }
    len.div_ceil(divisor) * divisor
}

/// Pad a `(c, h, w)` tensor at the bottom and right so both spatial sizes are
/// multiples of `divisor`.
///
/// The original content stays anchored at the origin, so `[.., ..h, ..w]` of
/// the result is the input. Returns the input unchanged when it is already
/// divisible.
pub fn divisible_pad(tensor: Array3<f32>, divisor: usize, value: f32) -> Array3<f32> {
    let (c, h, w) = tensor.dim();
    let (ph, pw) = (padded_len(h, divisor), padded_len(w, divisor));
    if (ph, pw) == (h, w) {
        return tensor;
    }

    let mut padded = Array3::from_elem((c, ph, pw), value);
    padded.slice_mut(s![.., ..h, ..w]).assign(&tensor);
    padded
}
