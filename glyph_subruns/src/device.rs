// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Device capabilities and distance-field thresholds.

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::error::{DecodeError, DecodeErrorKind};
use crate::kurbo::Affine;
use crate::math::max_scale;

/// Distance-field strike size for small text.
pub const DISTANCE_FIELD_SMALL_SIZE: f32 = 32.0;
/// Distance-field strike size for medium text.
pub const DISTANCE_FIELD_MEDIUM_SIZE: f32 = 72.0;
/// Distance-field strike size for large text.
pub const DISTANCE_FIELD_LARGE_SIZE: f32 = 162.0;

/// Decides when glyphs are drawn as scaled distance fields.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SdftControl {
    /// Smallest device text size drawn with distance fields.
    pub min_distance_field_size: f32,
    /// Largest device text size drawn with distance fields.
    pub max_distance_field_size: f32,
    /// Whether distance fields may be used at all.
    pub able_to_use_sdft: bool,
    /// Whether text below `min_distance_field_size` may use distance fields.
    pub use_sdft_for_small_text: bool,
}

impl Default for SdftControl {
    fn default() -> Self {
        Self {
            min_distance_field_size: 18.0,
            max_distance_field_size: 2.0 * DISTANCE_FIELD_LARGE_SIZE,
            able_to_use_sdft: true,
            use_sdft_for_small_text: false,
        }
    }
}

impl SdftControl {
    /// Whether text of `device_text_size` pixels should use distance fields.
    pub fn is_sdft(&self, device_text_size: f32) -> bool {
        if !self.able_to_use_sdft || device_text_size <= 0.0 {
            return false;
        }
        let min = if self.use_sdft_for_small_text {
            0.0
        } else {
            self.min_distance_field_size
        };
        min <= device_text_size && device_text_size <= self.max_distance_field_size
    }

    /// Strike size for a run whose text size is `text_size` and device text
    /// size is `device_text_size`, plus the range of transform scales the
    /// resulting distance fields stay valid for.
    pub fn sdf_strike_size_and_range(
        &self,
        text_size: f32,
        device_text_size: f32,
    ) -> (f32, SdftMatrixRange) {
        let small_min = if self.use_sdft_for_small_text {
            0.0
        } else {
            self.min_distance_field_size
        };
        let (strike_size, min, max) = if device_text_size <= DISTANCE_FIELD_SMALL_SIZE {
            (DISTANCE_FIELD_SMALL_SIZE, small_min, DISTANCE_FIELD_SMALL_SIZE)
        } else if device_text_size <= DISTANCE_FIELD_MEDIUM_SIZE {
            (
                DISTANCE_FIELD_MEDIUM_SIZE,
                DISTANCE_FIELD_SMALL_SIZE,
                DISTANCE_FIELD_MEDIUM_SIZE,
            )
        } else {
            (
                DISTANCE_FIELD_LARGE_SIZE,
                DISTANCE_FIELD_MEDIUM_SIZE,
                self.max_distance_field_size,
            )
        };
        let range = SdftMatrixRange {
            min_scale: min / text_size,
            max_scale: max / text_size,
        };
        (strike_size, range)
    }
}

/// Range of transform scales over which a distance-field sub-run can be
/// redrawn without rebuilding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SdftMatrixRange {
    /// Smallest accepted scale, inclusive.
    pub min_scale: f32,
    /// Largest accepted scale, inclusive.
    pub max_scale: f32,
}

impl SdftMatrixRange {
    /// Whether `transform`'s largest scale lies within the range.
    pub fn matrix_in_range(&self, transform: &Affine) -> bool {
        if !transform.is_finite() {
            return false;
        }
        let scale = max_scale(transform);
        f64::from(self.min_scale) <= scale && scale <= f64::from(self.max_scale)
    }

    pub(crate) fn flatten(&self, buffer: &mut WriteBuffer) {
        buffer.write_f32(self.min_scale);
        buffer.write_f32(self.max_scale);
    }

    pub(crate) fn make_from_buffer(buffer: &mut ReadBuffer<'_>) -> Result<Self, DecodeError> {
        let offset = buffer.offset();
        let min_scale = buffer.read_f32()?;
        let max_scale = buffer.read_f32()?;
        if min_scale < 0.0 || max_scale < min_scale {
            return Err(DecodeError::new(DecodeErrorKind::InvalidSubRun, offset));
        }
        Ok(Self {
            min_scale,
            max_scale,
        })
    }
}

/// What the target surface supports, as far as strikes are concerned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrikeDeviceInfo {
    /// Whether the surface's pixel geometry allows LCD text.
    pub lcd_allowed: bool,
    /// Distance-field thresholds; `None` disables distance fields.
    pub sdft_control: Option<SdftControl>,
}

impl Default for StrikeDeviceInfo {
    fn default() -> Self {
        Self {
            lcd_allowed: true,
            sdft_control: Some(SdftControl::default()),
        }
    }
}

impl StrikeDeviceInfo {
    /// Device info for a surface that draws every glyph as a mask.
    pub fn masks_only() -> Self {
        Self {
            lcd_allowed: true,
            sdft_control: None,
        }
    }
}
