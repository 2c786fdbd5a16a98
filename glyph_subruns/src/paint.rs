// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The parts of a paint that affect how glyph sub-runs are built.

use crate::color::{AlphaColor, Srgb};
use crate::glyph::MaskFormat;

/// How glyph edges are rasterized.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Edging {
    /// No antialiasing; coverage is 0 or 1.
    Alias = 0,
    /// Grayscale antialiasing.
    #[default]
    AntiAlias = 1,
    /// Per-channel (LCD) antialiasing.
    SubpixelAntiAlias = 2,
}

impl Edging {
    /// Decodes an edging from its serialized byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Alias),
            1 => Some(Self::AntiAlias),
            2 => Some(Self::SubpixelAntiAlias),
            _ => None,
        }
    }

    /// The atlas format monochrome glyphs with this edging are stored in.
    pub fn mask_format(self) -> MaskFormat {
        match self {
            Self::Alias | Self::AntiAlias => MaskFormat::A8,
            Self::SubpixelAntiAlias => MaskFormat::A565,
        }
    }

    /// Whether edges are antialiased at all.
    #[inline]
    pub fn is_antialiased(self) -> bool {
        self != Self::Alias
    }
}

/// Paint state a text draw hands to sub-run construction, reuse and drawing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunPaint {
    /// The text color.
    pub color: AlphaColor<Srgb>,
    /// How glyph edges are rasterized.
    pub edging: Edging,
}

impl RunPaint {
    /// Creates a paint with the given color and edging.
    pub fn new(color: AlphaColor<Srgb>, edging: Edging) -> Self {
        Self { color, edging }
    }

    /// Returns this paint with a different edging.
    #[must_use]
    pub fn with_edging(mut self, edging: Edging) -> Self {
        self.edging = edging;
        self
    }
}

impl Default for RunPaint {
    fn default() -> Self {
        Self {
            color: AlphaColor::BLACK,
            edging: Edging::default(),
        }
    }
}
