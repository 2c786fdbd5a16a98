// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{
    read_edging, AtlasDrawDelegate, AtlasRunCore, AtlasSubRun, GlyphParams, SubRun,
    SubRunStorage, SubRunStreamTag, TRANSFORMED_MASK_PADDING,
};
use crate::allocator::SubRunAllocator;
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::error::DecodeError;
use crate::kurbo::{Affine, Point};
use crate::math::is_invertible;
use crate::paint::{Edging, RunPaint};
use crate::strike::StrikeClient;

/// Glyph masks rasterized in source space and drawn through the position
/// matrix.
///
/// Used for glyphs too large for a direct mask; the images are scaled by the
/// GPU, so any invertible matrix can reuse them.
#[derive(Debug)]
pub struct TransformedMaskSubRun {
    core: AtlasRunCore,
    creation_edging: Edging,
}

impl TransformedMaskSubRun {
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

impl SubRun for TransformedMaskSubRun {
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
        SubRunStreamTag::TransformedMask
    }

    fn unflatten_size(&self) -> usize {
        size_of::<super::SubRunVariant>() + self.core.unflatten_size()
    }

    fn can_reuse(&self, paint: &RunPaint, position_matrix: &Affine) -> bool {
        self.core.edging_compatible(self.creation_edging, paint) && is_invertible(position_matrix)
    }

    fn testing_only_atlas_sub_run(&self) -> Option<&dyn AtlasSubRun> {
        Some(self)
    }
}

impl AtlasSubRun for TransformedMaskSubRun {
    fn atlas_core(&self) -> &AtlasRunCore {
        &self.core
    }

    fn glyph_src_padding(&self) -> u32 {
        TRANSFORMED_MASK_PADDING
    }

    fn glyph_params(&self) -> GlyphParams {
        self.core.glyph_params(self.creation_edging)
    }
}
