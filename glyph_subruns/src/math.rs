// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mathematical helper functions.

use crate::kurbo::{Affine, Vec2};

#[cfg(not(feature = "std"))]
use crate::kurbo::common::FloatFuncs as _;

// From <https://github.com/linebender/tiny-skia/blob/68b198a7210a6bbf752b43d6bc4db62445730313/path/src/scalar.rs#L12>
const SCALAR_NEARLY_ZERO: f64 = 1.0 / (1 << 12) as f64;

/// A number of useful methods for f64 numbers.
pub(crate) trait FloatExt: Sized {
    /// Whether the number is approximately 0.
    fn is_nearly_zero(&self) -> bool {
        self.is_nearly_zero_within_tolerance(SCALAR_NEARLY_ZERO)
    }

    /// Whether the number is approximately 0, with a given tolerance.
    fn is_nearly_zero_within_tolerance(&self, tolerance: f64) -> bool;

    /// Whether the number is approximately a whole number.
    fn is_nearly_integer(&self) -> bool;
}

impl FloatExt for f64 {
    #[inline(always)]
    fn is_nearly_zero_within_tolerance(&self, tolerance: f64) -> bool {
        debug_assert!(tolerance >= 0.0, "tolerance must be positive");

        self.abs() <= tolerance
    }

    #[inline]
    fn is_nearly_integer(&self) -> bool {
        (self - self.round()).is_nearly_zero()
    }
}

/// The largest factor by which `transform` stretches any unit vector.
///
/// This is the larger singular value of the linear part.
pub(crate) fn max_scale(transform: &Affine) -> f64 {
    let [a, b, c, d, _, _] = transform.as_coeffs();
    // Singular values of [[a, c], [b, d]] are (p ± q) / 2.
    let p = (a + d).hypot(b - c);
    let q = (a - d).hypot(b + c);
    (p + q) * 0.5
}

/// Whether two transforms share the same 2x2 linear part.
pub(crate) fn same_linear(a: &Affine, b: &Affine) -> bool {
    let a = a.as_coeffs();
    let b = b.as_coeffs();
    a[..4]
        .iter()
        .zip(&b[..4])
        .all(|(x, y)| (x - y).is_nearly_zero())
}

/// If `position` differs from `creation` only by a translation, returns it.
pub(crate) fn translation_delta(creation: &Affine, position: &Affine) -> Option<Vec2> {
    if !same_linear(creation, position) {
        return None;
    }
    Some(position.translation() - creation.translation())
}

/// Whether the transform's coefficients are all finite and its linear part
/// can be inverted.
pub(crate) fn is_invertible(transform: &Affine) -> bool {
    transform.is_finite() && !transform.determinant().is_nearly_zero_within_tolerance(f64::EPSILON)
}
