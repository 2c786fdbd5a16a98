// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shaped glyph runs, the input sub-runs are built from.

use alloc::vec::Vec;

use crate::glyph::GlyphId;
use crate::kurbo::{Affine, Point};

/// A font at a particular size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FontInstance {
    /// Unique identifier for the font blob.
    pub font_id: u64,
    /// Index within font collection (for TTC files).
    pub font_index: u32,
    /// Font size in pixels per em.
    pub size: f32,
    /// Whether hinting is requested.
    pub hinted: bool,
}

impl FontInstance {
    /// Creates a hinted font instance.
    pub fn new(font_id: u64, font_index: u32, size: f32) -> Self {
        Self {
            font_id,
            font_index,
            size,
            hinted: true,
        }
    }
}

/// Positioned glyph.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PositionedGlyph {
    /// The font-specific identifier for this glyph.
    ///
    /// This ID is specific to the font being used and corresponds to the
    /// glyph index within that font. It is *not* a Unicode code point.
    pub id: GlyphId,
    /// X-offset in run, relative to the run list origin.
    pub x: f32,
    /// Y-offset in run, relative to the run list origin.
    pub y: f32,
}

impl PositionedGlyph {
    /// Creates a positioned glyph.
    pub fn new(id: GlyphId, x: f32, y: f32) -> Self {
        Self { id, x, y }
    }

    /// The glyph origin as a point.
    #[inline]
    pub fn position(&self) -> Point {
        Point::new(f64::from(self.x), f64::from(self.y))
    }
}

/// A sequence of glyphs in one font.
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphRun {
    /// The font the glyphs are drawn with.
    pub font: FontInstance,
    /// The glyphs, in logical order.
    pub glyphs: Vec<PositionedGlyph>,
}

/// A builder for configuring a [`GlyphRun`].
#[derive(Debug)]
#[must_use = "Methods on the builder don't do anything until `build` is called."]
pub struct GlyphRunBuilder {
    run: GlyphRun,
}

impl GlyphRunBuilder {
    /// Creates a new builder for a run in the given font.
    pub fn new(font_id: u64) -> Self {
        Self {
            run: GlyphRun {
                font: FontInstance::new(font_id, 0, 16.0),
                glyphs: Vec::new(),
            },
        }
    }

    /// Set the index of the font within its collection.
    pub fn font_index(mut self, index: u32) -> Self {
        self.run.font.font_index = index;
        self
    }

    /// Set the font size in pixels per em.
    pub fn font_size(mut self, size: f32) -> Self {
        self.run.font.size = size;
        self
    }

    /// Set whether font hinting is enabled.
    pub fn hint(mut self, hint: bool) -> Self {
        self.run.font.hinted = hint;
        self
    }

    /// Appends glyphs to the run.
    pub fn glyphs(mut self, glyphs: impl IntoIterator<Item = PositionedGlyph>) -> Self {
        self.run.glyphs.extend(glyphs);
        self
    }

    /// Consumes the builder and returns the run.
    pub fn build(self) -> GlyphRun {
        self.run
    }
}

/// The shaped text of one draw: runs positioned relative to an origin.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlyphRunList {
    /// Origin the glyph positions are relative to.
    pub origin: Point,
    /// The runs, in drawing order.
    pub runs: Vec<GlyphRun>,
}

impl GlyphRunList {
    /// Creates an empty run list at `origin`.
    pub fn new(origin: Point) -> Self {
        Self {
            origin,
            runs: Vec::new(),
        }
    }

    /// Appends a run.
    pub fn push(&mut self, run: GlyphRun) {
        self.runs.push(run);
    }

    /// Appends a run, builder style.
    #[must_use]
    pub fn with_run(mut self, run: GlyphRun) -> Self {
        self.push(run);
        self
    }

    /// Whether the list holds no glyphs at all.
    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|run| run.glyphs.is_empty())
    }

    /// Number of glyphs across all runs.
    pub fn total_glyph_count(&self) -> usize {
        self.runs.iter().map(|run| run.glyphs.len()).sum()
    }

    /// The transform mapping glyph positions to device space when the list
    /// is drawn with `draw_matrix`.
    pub fn position_matrix(&self, draw_matrix: Affine) -> Affine {
        draw_matrix * Affine::translate(self.origin.to_vec2())
    }
}
