// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The glyph collection of an atlas sub-run.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::allocator::SubRunAllocator;
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::error::{DecodeError, DecodeErrorKind};
use crate::glyph::{Glyph, PackedGlyphId};
use crate::strike::{StrikeCache, StrikeClient, StrikeDescriptor};

/// Glyphs of one sub-run, all from one strike, with their atlas residency.
///
/// Residency is refreshed in place during atlas regeneration; everything
/// else only reads it.
#[derive(Debug)]
pub struct GlyphVector {
    strike: StrikeDescriptor,
    glyphs: Box<[Glyph]>,
    /// Atlas generation at which every glyph was last known resident.
    atlas_generation: u64,
}

impl GlyphVector {
    /// Creates a vector of unplaced glyphs.
    pub fn new(strike: StrikeDescriptor, glyphs: Box<[Glyph]>) -> Self {
        Self {
            strike,
            glyphs,
            atlas_generation: 0,
        }
    }

    pub(crate) fn from_packed_ids(
        strike: StrikeDescriptor,
        ids: impl IntoIterator<Item = PackedGlyphId>,
        alloc: &SubRunAllocator,
    ) -> Self {
        Self::new(strike, alloc.make_slice(ids.into_iter().map(Glyph::new)))
    }

    /// The strike the glyph images belong to.
    #[inline]
    pub fn strike(&self) -> &StrikeDescriptor {
        &self.strike
    }

    /// The glyphs.
    #[inline]
    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    /// Mutable access to the glyphs, for updating their atlas placement.
    #[inline]
    pub fn glyphs_mut(&mut self) -> &mut [Glyph] {
        &mut self.glyphs
    }

    /// Number of glyphs.
    #[inline]
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// Whether there are no glyphs.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Atlas generation at which every glyph was last known resident, or `0`.
    #[inline]
    pub fn atlas_generation(&self) -> u64 {
        self.atlas_generation
    }

    /// Records that every glyph is resident as of `generation`.
    pub fn set_atlas_generation(&mut self, generation: u64) {
        self.atlas_generation = generation;
    }

    /// Replaces every glyph with the shared record of its strike in
    /// `strike_cache`, picking up placements made by other sub-runs.
    pub fn packed_glyph_id_to_glyph(&mut self, strike_cache: &mut StrikeCache) {
        let strike = strike_cache.find_or_create_strike(&self.strike);
        for glyph in self.glyphs.iter_mut() {
            *glyph = strike.glyph(glyph.packed_id);
        }
        self.atlas_generation = 0;
    }

    /// Bytes the vector occupies in an arena once deserialized.
    pub fn unflatten_size(&self) -> usize {
        self.glyphs.len() * size_of::<Glyph>()
    }

    pub(crate) fn flatten(&self, buffer: &mut WriteBuffer) {
        self.strike.flatten(buffer);
        buffer.write_usize(self.glyphs.len());
        for glyph in &self.glyphs {
            buffer.write_varint(glyph.packed_id.to_bits());
        }
    }

    pub(crate) fn make_from_buffer(
        buffer: &mut ReadBuffer<'_>,
        client: Option<&dyn StrikeClient>,
        alloc: &SubRunAllocator,
    ) -> Result<Self, DecodeError> {
        let strike = StrikeDescriptor::make_from_buffer(buffer, client)?;
        let count = buffer.read_count(1)?;
        let mut glyphs = Vec::with_capacity(count);
        for _ in 0..count {
            let offset = buffer.offset();
            let packed_id = PackedGlyphId::from_bits(buffer.read_varint()?)
                .ok_or(DecodeError::new(DecodeErrorKind::InvalidGlyphId, offset))?;
            glyphs.push(Glyph::new(packed_id));
        }
        Ok(Self::new(strike, alloc.make_slice(glyphs)))
    }
}
