// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Glyph identity, atlas placement and mask formats.

use crate::kurbo::Rect;

#[cfg(not(feature = "std"))]
use crate::kurbo::common::FloatFuncs as _;

pub use skrifa::GlyphId;

/// Number of horizontal subpixel quantization buckets.
///
/// More buckets = better quality but more atlas entries.
pub const SUBPIXEL_BUCKETS: u8 = 4;

/// A glyph id together with the subpixel bucket it was rasterized for.
///
/// Two packed ids are equal exactly when their atlas images are
/// interchangeable within one strike.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PackedGlyphId {
    glyph_id: GlyphId,
    subpixel_x: u8,
}

impl PackedGlyphId {
    /// Creates a packed id; `subpixel_x` is clamped to the last bucket.
    pub fn new(glyph_id: GlyphId, subpixel_x: u8) -> Self {
        Self {
            glyph_id,
            subpixel_x: subpixel_x.min(SUBPIXEL_BUCKETS - 1),
        }
    }

    /// Creates a packed id for a glyph whose device x coordinate has the
    /// given fractional part.
    pub fn with_fractional_x(glyph_id: GlyphId, fractional_x: f64) -> Self {
        Self::new(glyph_id, quantize_subpixel(fractional_x))
    }

    /// The glyph id.
    #[inline]
    pub fn glyph_id(&self) -> GlyphId {
        self.glyph_id
    }

    /// The subpixel bucket (0 to [`SUBPIXEL_BUCKETS`] - 1).
    #[inline]
    pub fn subpixel_x(&self) -> u8 {
        self.subpixel_x
    }

    /// Horizontal offset, in pixels, the bucket was rasterized at.
    #[inline]
    pub fn subpixel_offset(&self) -> f64 {
        subpixel_offset(self.subpixel_x)
    }

    /// Packs the id into a single integer for serialization.
    pub fn to_bits(self) -> u64 {
        (u64::from(self.glyph_id.to_u32()) << 8) | u64::from(self.subpixel_x)
    }

    /// Unpacks an id produced by [`PackedGlyphId::to_bits`].
    ///
    /// Returns `None` if the bucket or glyph index is out of range.
    pub fn from_bits(bits: u64) -> Option<Self> {
        let subpixel_x = u8::try_from(bits & 0xff).ok()?;
        if subpixel_x >= SUBPIXEL_BUCKETS {
            return None;
        }
        let glyph_id = u32::try_from(bits >> 8).ok()?;
        Some(Self {
            glyph_id: GlyphId::new(glyph_id),
            subpixel_x,
        })
    }
}

/// Quantize fractional position to [`SUBPIXEL_BUCKETS`] buckets.
#[expect(
    clippy::cast_possible_truncation,
    reason = "result is clamped to SUBPIXEL_BUCKETS-1 which fits in u8"
)]
#[inline]
pub(crate) fn quantize_subpixel(x: f64) -> u8 {
    let normalized = x - x.floor();
    ((normalized * f64::from(SUBPIXEL_BUCKETS)).round() as u8).min(SUBPIXEL_BUCKETS - 1)
}

/// Returns the subpixel offset value for a quantized bucket.
#[inline]
pub(crate) fn subpixel_offset(quantized: u8) -> f64 {
    f64::from(quantized) / f64::from(SUBPIXEL_BUCKETS)
}

/// The pixel format an atlas page stores glyph images in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MaskFormat {
    /// 8-bit coverage; also used for distance fields.
    A8 = 0,
    /// 16-bit per-channel coverage for LCD text.
    A565 = 1,
    /// 32-bit premultiplied color, for color and bitmap glyphs.
    Argb = 2,
}

impl MaskFormat {
    /// Decodes a format from its serialized byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::A8),
            1 => Some(Self::A565),
            2 => Some(Self::Argb),
            _ => None,
        }
    }

    /// Bytes one texel occupies in the atlas.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::A8 => 1,
            Self::A565 => 2,
            Self::Argb => 4,
        }
    }

    /// Whether glyphs in this format carry their own color.
    #[inline]
    pub fn is_color(self) -> bool {
        self == Self::Argb
    }
}

/// Location of a glyph image within the GPU atlas.
///
/// The rect excludes the source padding the sub-run requested; padding
/// surrounds it in the atlas page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AtlasLocator {
    /// Which atlas page contains this glyph.
    pub page_index: u32,

    /// X position in atlas (pixels).
    pub x: u16,

    /// Y position in atlas (pixels).
    pub y: u16,

    /// Width of glyph image (pixels).
    pub width: u16,

    /// Height of glyph image (pixels).
    pub height: u16,

    /// Atlas generation the image was written in; `0` means not resident.
    pub generation: u64,
}

impl AtlasLocator {
    /// Whether the glyph has ever been placed in the atlas.
    #[inline]
    pub fn is_resident(&self) -> bool {
        self.generation != 0
    }

    /// Texel rect as `[left, top, right, bottom]`.
    pub fn uv_rect(&self) -> [u16; 4] {
        [
            self.x,
            self.y,
            self.x.saturating_add(self.width),
            self.y.saturating_add(self.height),
        ]
    }
}

/// A glyph as stored in a sub-run: its packed id and where its image lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Glyph {
    /// Identity of the glyph image within its strike.
    pub packed_id: PackedGlyphId,
    /// Atlas placement; refreshed during atlas regeneration.
    pub atlas_locator: AtlasLocator,
}

impl Glyph {
    /// A glyph that has not been placed in the atlas yet.
    pub fn new(packed_id: PackedGlyphId) -> Self {
        Self {
            packed_id,
            atlas_locator: AtlasLocator::default(),
        }
    }
}

/// Image metrics a strike reports for one glyph.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphMetrics {
    /// Integer-aligned image bounds in strike pixels, relative to the glyph
    /// origin.
    pub bounds: Rect,
    /// Whether the glyph is a color (bitmap or COLR) glyph.
    pub is_color: bool,
}

impl GlyphMetrics {
    /// Metrics of a glyph with no image (such as a space).
    pub const EMPTY: Self = Self {
        bounds: Rect::ZERO,
        is_color: false,
    };

    /// Whether the glyph has no visible image.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bounds.is_zero_area()
    }

    /// Whether both image dimensions are at most `max` pixels.
    #[inline]
    pub fn fits_within(&self, max: u16) -> bool {
        self.bounds.width() <= f64::from(max) && self.bounds.height() <= f64::from(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_subpixel() {
        // Test bucket boundaries
        assert_eq!(quantize_subpixel(0.0), 0);
        assert_eq!(quantize_subpixel(0.1), 0);
        assert_eq!(quantize_subpixel(0.2), 1);
        assert_eq!(quantize_subpixel(0.25), 1);
        assert_eq!(quantize_subpixel(0.4), 2);
        assert_eq!(quantize_subpixel(0.5), 2);
        assert_eq!(quantize_subpixel(0.6), 2);
        assert_eq!(quantize_subpixel(0.7), 3);
        assert_eq!(quantize_subpixel(0.75), 3);
        assert_eq!(quantize_subpixel(0.9), 3);
        assert_eq!(quantize_subpixel(1.0), 0);
        assert_eq!(quantize_subpixel(-0.25), 3);
        assert_eq!(quantize_subpixel(12.5), 2);
    }

    #[test]
    fn test_subpixel_offset() {
        assert_eq!(subpixel_offset(0), 0.0);
        assert_eq!(subpixel_offset(1), 0.25);
        assert_eq!(subpixel_offset(2), 0.5);
        assert_eq!(subpixel_offset(3), 0.75);
    }

    #[test]
    fn packed_id_bits() {
        let id = PackedGlyphId::new(GlyphId::new(70_000), 3);
        assert_eq!(PackedGlyphId::from_bits(id.to_bits()), Some(id));
        assert_eq!(PackedGlyphId::from_bits((5 << 8) | 4), None);
    }

    #[test]
    fn packed_id_clamps_bucket() {
        assert_eq!(PackedGlyphId::new(GlyphId::new(1), 200).subpixel_x(), 3);
    }

    #[test]
    fn mask_format_bytes() {
        for format in [MaskFormat::A8, MaskFormat::A565, MaskFormat::Argb] {
            assert_eq!(MaskFormat::from_u8(format as u8), Some(format));
        }
        assert_eq!(MaskFormat::from_u8(3), None);
        assert_eq!(MaskFormat::Argb.bytes_per_pixel(), 4);
    }

    #[test]
    fn empty_metrics() {
        assert!(GlyphMetrics::EMPTY.is_empty());
        let metrics = GlyphMetrics {
            bounds: Rect::new(0.0, -10.0, 300.0, 2.0),
            is_color: false,
        };
        assert!(!metrics.is_empty());
        assert!(!metrics.fits_within(256));
    }
}
