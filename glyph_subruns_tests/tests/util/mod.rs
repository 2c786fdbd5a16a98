// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fakes for the collaborators sub-runs talk to.

use glyph_subruns::{
    AtlasDrawDelegate, AtlasLocator, AtlasSubRun, GlyphId, GlyphMetrics, GlyphRun,
    GlyphRunBuilder, GlyphRunList, GlyphVector, MaskFormat, PackedGlyphId, PositionedGlyph,
    RegenerateAtlasDelegate, RendererData, RunPaint, StrikeDescriptor, StrikeDeviceInfo,
    StrikeForGpuCache, SubRunAllocator, SubRunContainer, SubRunContainerOwner,
    SubRunCreationBehavior, SubRunStorage,
};
use peniko::kurbo::{Affine, Point, Rect};

/// Font id every test run is shaped with.
pub(crate) const FONT_ID: u64 = 7;
/// Glyph with no image.
pub(crate) const SPACE: u32 = 0;
/// Color glyph.
pub(crate) const EMOJI: u32 = 9;
/// Baseline of every test run.
pub(crate) const BASELINE: f32 = 20.0;

/// Strike cache whose glyphs are all half an em wide and three quarters of an
/// em tall, sitting on the baseline.
#[derive(Debug, Default)]
pub(crate) struct FakeStrikes {
    pub(crate) lookups: Vec<(StrikeDescriptor, PackedGlyphId)>,
}

impl StrikeForGpuCache for FakeStrikes {
    fn glyph_metrics(&mut self, strike: &StrikeDescriptor, glyph: PackedGlyphId) -> GlyphMetrics {
        self.lookups.push((*strike, glyph));
        let id = glyph.glyph_id().to_u32();
        if id == SPACE {
            return GlyphMetrics::EMPTY;
        }
        let [a, b, c, d, _, _] = strike.linear().as_coeffs();
        let em = f64::from(strike.size()) * a.hypot(b).max(c.hypot(d));
        GlyphMetrics {
            bounds: Rect::new(0.0, -0.75 * em, 0.5 * em, 0.0),
            is_color: id == EMOJI,
        }
    }
}

/// A run of `ids` at `size`, ten units apart on the baseline.
pub(crate) fn glyph_run(size: f32, ids: &[u32]) -> GlyphRun {
    GlyphRunBuilder::new(FONT_ID)
        .font_size(size)
        .glyphs(ids.iter().enumerate().map(|(i, id)| {
            PositionedGlyph::new(GlyphId::new(*id), 10.0 * i as f32, BASELINE)
        }))
        .build()
}

/// A list holding one run of `ids` at `size`.
pub(crate) fn run_list(size: f32, ids: &[u32]) -> GlyphRunList {
    GlyphRunList::new(Point::ZERO).with_run(glyph_run(size, ids))
}

/// Builds sub-runs for `list` with a fresh [`FakeStrikes`].
pub(crate) fn build<'a>(
    alloc: &'a SubRunAllocator,
    list: &GlyphRunList,
    position_matrix: Affine,
    paint: &RunPaint,
    device_info: &StrikeDeviceInfo,
) -> SubRunContainerOwner<'a> {
    SubRunContainer::make_in_alloc(
        list,
        &position_matrix,
        paint,
        device_info,
        &mut FakeStrikes::default(),
        alloc,
        SubRunCreationBehavior::AddSubRuns,
        "test",
    )
}

/// Glyph ids of an atlas sub-run, in order.
pub(crate) fn glyph_ids(sub_run: &dyn AtlasSubRun) -> Vec<u32> {
    sub_run
        .glyphs()
        .iter()
        .map(|glyph| glyph.packed_id.glyph_id().to_u32())
        .collect()
}

/// What one draw call saw.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DrawRecord {
    pub(crate) glyph_ids: Vec<u32>,
    pub(crate) origin: Point,
    pub(crate) renderer_data: RendererData,
    pub(crate) has_storage: bool,
}

/// Draw delegate that records every sub-run handed to it.
#[derive(Debug, Default)]
pub(crate) struct DrawRecorder {
    pub(crate) draws: Vec<DrawRecord>,
    pub(crate) storage: Vec<SubRunStorage>,
}

impl AtlasDrawDelegate for DrawRecorder {
    fn draw(
        &mut self,
        sub_run: &dyn AtlasSubRun,
        draw_origin: Point,
        _paint: &RunPaint,
        storage: SubRunStorage,
        renderer_data: RendererData,
    ) {
        self.draws.push(DrawRecord {
            glyph_ids: glyph_ids(sub_run),
            origin: draw_origin,
            renderer_data,
            has_storage: storage.get().is_some(),
        });
        self.storage.push(storage);
    }
}

/// Atlas that places 8x12 glyph images left to right on one page until it
/// holds `capacity` images.
#[derive(Debug)]
pub(crate) struct ScriptedAtlas {
    pub(crate) capacity: usize,
    pub(crate) placed: usize,
    pub(crate) generation: u64,
    pub(crate) calls: Vec<(usize, usize, MaskFormat, u32)>,
}

impl ScriptedAtlas {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            placed: 0,
            generation: 1,
            calls: Vec::new(),
        }
    }
}

impl RegenerateAtlasDelegate for ScriptedAtlas {
    fn regenerate(
        &mut self,
        glyphs: &mut GlyphVector,
        begin: usize,
        end: usize,
        mask_format: MaskFormat,
        padding: u32,
    ) -> (bool, usize) {
        self.calls.push((begin, end, mask_format, padding));
        let mut done = 0;
        for glyph in &mut glyphs.glyphs_mut()[begin..end] {
            if !glyph.atlas_locator.is_resident() {
                if self.placed == self.capacity {
                    break;
                }
                glyph.atlas_locator = AtlasLocator {
                    page_index: 0,
                    x: (self.placed * 16) as u16,
                    y: 0,
                    width: 8,
                    height: 12,
                    generation: self.generation,
                };
                self.placed += 1;
            }
            done += 1;
        }
        glyphs.set_atlas_generation(self.generation);
        (begin + done == end, done)
    }
}
