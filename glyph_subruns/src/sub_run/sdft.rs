// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{
    read_edging, AtlasDrawDelegate, AtlasRunCore, AtlasSubRun, GlyphParams, SubRun,
    SubRunStorage, SubRunStreamTag, DISTANCE_FIELD_PADDING,
};
use crate::allocator::SubRunAllocator;
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::device::SdftMatrixRange;
use crate::error::{DecodeError, DecodeErrorKind};
use crate::glyph::MaskFormat;
use crate::kurbo::{Affine, Point};
use crate::paint::{Edging, RunPaint};
use crate::strike::StrikeClient;

/// Glyphs drawn from signed distance fields.
///
/// One field serves a range of scales, recorded in an [`SdftMatrixRange`].
#[derive(Debug)]
pub struct SdftSubRun {
    core: AtlasRunCore,
    creation_edging: Edging,
    use_lcd: bool,
    antialiased: bool,
    matrix_range: SdftMatrixRange,
}

impl SdftSubRun {
    pub(crate) fn new(
        core: AtlasRunCore,
        creation_edging: Edging,
        use_lcd: bool,
        matrix_range: SdftMatrixRange,
    ) -> Self {
        Self {
            core,
            creation_edging,
            use_lcd,
            antialiased: creation_edging.is_antialiased(),
            matrix_range,
        }
    }

    /// Range of position matrix scales the fields stay valid for.
    pub fn matrix_range(&self) -> SdftMatrixRange {
        self.matrix_range
    }

    pub(crate) fn make_from_buffer(
        buffer: &mut ReadBuffer<'_>,
        alloc: &SubRunAllocator,
        client: Option<&dyn StrikeClient>,
    ) -> Result<Self, DecodeError> {
        let creation_edging = read_edging(buffer)?;
        let use_lcd = buffer.read_bool()?;
        let antialiased = buffer.read_bool()?;
        let matrix_range = SdftMatrixRange::make_from_buffer(buffer)?;
        let offset = buffer.offset();
        let core = AtlasRunCore::make_from_buffer(buffer, alloc, client)?;
        if core.filler.mask_format() != MaskFormat::A8 {
            return Err(DecodeError::new(DecodeErrorKind::InvalidSubRun, offset));
        }
        Ok(Self {
            core,
            creation_edging,
            use_lcd,
            antialiased,
            matrix_range,
        })
    }
}

impl SubRun for SdftSubRun {
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
        buffer.write_bool(self.use_lcd);
        buffer.write_bool(self.antialiased);
        self.matrix_range.flatten(buffer);
        self.core.flatten(buffer);
    }

    fn sub_run_stream_tag(&self) -> SubRunStreamTag {
        SubRunStreamTag::Sdft
    }

    fn unflatten_size(&self) -> usize {
        size_of::<super::SubRunVariant>() + self.core.unflatten_size()
    }

    fn can_reuse(&self, paint: &RunPaint, position_matrix: &Affine) -> bool {
        paint.edging == self.creation_edging && self.matrix_range.matrix_in_range(position_matrix)
    }

    fn testing_only_atlas_sub_run(&self) -> Option<&dyn AtlasSubRun> {
        Some(self)
    }
}

impl AtlasSubRun for SdftSubRun {
    fn atlas_core(&self) -> &AtlasRunCore {
        &self.core
    }

    fn glyph_src_padding(&self) -> u32 {
        DISTANCE_FIELD_PADDING
    }

    fn glyph_params(&self) -> GlyphParams {
        GlyphParams {
            is_sdf: true,
            is_lcd: self.use_lcd,
            is_aa: self.antialiased,
        }
    }
}
