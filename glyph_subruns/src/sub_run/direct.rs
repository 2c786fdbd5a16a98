// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{
    read_edging, AtlasDrawDelegate, AtlasRunCore, AtlasSubRun, GlyphParams, SubRun,
    SubRunStorage, SubRunStreamTag, DIRECT_MASK_PADDING,
};
use crate::allocator::SubRunAllocator;
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::error::DecodeError;
use crate::kurbo::{Affine, Point};
use crate::math::{translation_delta, FloatExt as _};
use crate::paint::{Edging, RunPaint};
use crate::strike::StrikeClient;

/// Glyph masks rasterized in device space with the draw matrix baked in.
///
/// Redrawable as long as the matrix only moves by whole pixels.
#[derive(Debug)]
pub struct DirectMaskSubRun {
    core: AtlasRunCore,
    creation_edging: Edging,
}

impl DirectMaskSubRun {
    pub(crate) fn new(core: AtlasRunCore, creation_edging: Edging) -> Self {
        Self {
            core,
            creation_edging,
        }
    }

    pub(crate) fn make_from_buffer(
        buffer: &mut ReadBuffer<'_>,
        alloc: &SubRunAllocator,
        client: Option<&dyn StrikeClient>,
    ) -> Result<Self, DecodeError> {
        let creation_edging = read_edging(buffer)?;
        let core = AtlasRunCore::make_from_buffer(buffer, alloc, client)?;
        Ok(Self::new(core, creation_edging))
    }
}

impl SubRun for DirectMaskSubRun {
    fn draw(
        &self,
        draw_origin: Point,
        paint: &RunPaint,
        storage: &SubRunStorage,
        delegate: &mut dyn AtlasDrawDelegate,
    ) {
        delegate.draw(
            self,
            draw_origin,
            paint,
            storage.clone(),
            self.renderer_data(),
        );
    }

    fn do_flatten(&self, buffer: &mut WriteBuffer) {
        buffer.write_u8(self.creation_edging as u8);
        self.core.flatten(buffer);
    }

    fn sub_run_stream_tag(&self) -> SubRunStreamTag {
        SubRunStreamTag::DirectMask
    }

    fn unflatten_size(&self) -> usize {
        size_of::<super::SubRunVariant>() + self.core.unflatten_size()
    }

    fn can_reuse(&self, paint: &RunPaint, position_matrix: &Affine) -> bool {
        if !self.core.edging_compatible(self.creation_edging, paint) {
            return false;
        }
        translation_delta(&self.core.filler.creation_matrix(), position_matrix)
            .is_some_and(|delta| delta.x.is_nearly_integer() && delta.y.is_nearly_integer())
    }

    fn testing_only_atlas_sub_run(&self) -> Option<&dyn AtlasSubRun> {
        Some(self)
    }
}

impl AtlasSubRun for DirectMaskSubRun {
    fn atlas_core(&self) -> &AtlasRunCore {
        &self.core
    }

    fn glyph_src_padding(&self) -> u32 {
        DIRECT_MASK_PADDING
    }

    fn glyph_params(&self) -> GlyphParams {
        self.core.glyph_params(self.creation_edging)
    }
}
