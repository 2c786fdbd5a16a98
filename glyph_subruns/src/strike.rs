// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Strikes: caches of glyph images for one font, size and render mode.
//!
//! Three collaborators meet here:
//! - [`StrikeForGpuCache`] is the scaler side. Sub-run construction asks it
//!   for glyph metrics so it can partition glyphs.
//! - [`StrikeCache`] is the GPU side. It shares [`Glyph`] records, including
//!   their atlas placement, between all sub-runs that use the same strike.
//! - [`StrikeClient`] maps font ids recorded in another process onto local
//!   ones while sub-runs are deserialized.

use core::fmt::{Debug, Formatter};
use core::hash::BuildHasher;

use hashbrown::HashMap;

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::error::{DecodeError, DecodeErrorKind};
use crate::glyph::{Glyph, GlyphMetrics, PackedGlyphId};
use crate::glyph_run::FontInstance;
use crate::kurbo::Affine;
use crate::paint::Edging;

/// Unique identifier of a strike.
///
/// Two descriptors are equal exactly when the glyph images they produce are
/// interchangeable. Floats are stored as bits so the descriptor can be
/// hashed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StrikeDescriptor {
    /// Unique identifier for the font blob.
    pub font_id: u64,
    /// Index within font collection (for TTC files).
    pub font_index: u32,
    /// Strike text size as f32 bits.
    pub size_bits: u32,
    /// Linear part of the device matrix baked into the images, as f32 bits.
    ///
    /// Identity for source-space strikes.
    pub linear_bits: [u32; 4],
    /// Coverage mode the images were rasterized with.
    pub edging: Edging,
    /// Whether hinting was applied.
    pub hinted: bool,
    /// Whether the strike holds distance fields instead of masks.
    pub sdf: bool,
}

impl StrikeDescriptor {
    /// Creates a descriptor.
    ///
    /// Only the 2x2 linear part of `device` is kept.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "strike matrices are stored at f32 precision"
    )]
    pub fn new(font: &FontInstance, size: f32, device: &Affine, edging: Edging, sdf: bool) -> Self {
        let [a, b, c, d, _, _] = device.as_coeffs();
        Self {
            font_id: font.font_id,
            font_index: font.font_index,
            size_bits: size.to_bits(),
            linear_bits: [
                (a as f32).to_bits(),
                (b as f32).to_bits(),
                (c as f32).to_bits(),
                (d as f32).to_bits(),
            ],
            edging,
            hinted: font.hinted,
            sdf,
        }
    }

    /// Strike text size in pixels per em.
    #[inline]
    pub fn size(&self) -> f32 {
        f32::from_bits(self.size_bits)
    }

    /// The baked-in device matrix, without translation.
    pub fn linear(&self) -> Affine {
        let [a, b, c, d] = self.linear_bits.map(|bits| f64::from(f32::from_bits(bits)));
        Affine::new([a, b, c, d, 0.0, 0.0])
    }

    pub(crate) fn flatten(&self, buffer: &mut WriteBuffer) {
        buffer.write_u64(self.font_id);
        buffer.write_varint(u64::from(self.font_index));
        buffer.write_f32(self.size());
        for bits in self.linear_bits {
            buffer.write_f32(f32::from_bits(bits));
        }
        buffer.write_u8(self.edging as u8);
        buffer.write_bool(self.hinted);
        buffer.write_bool(self.sdf);
    }

    pub(crate) fn make_from_buffer(
        buffer: &mut ReadBuffer<'_>,
        client: Option<&dyn StrikeClient>,
    ) -> Result<Self, DecodeError> {
        let font_offset = buffer.offset();
        let remote_font_id = buffer.read_u64()?;
        let font_id = match client {
            Some(client) => client
                .translate_font_id(remote_font_id)
                .ok_or(DecodeError::new(DecodeErrorKind::UnknownFont, font_offset))?,
            None => remote_font_id,
        };
        let index_offset = buffer.offset();
        let font_index = u32::try_from(buffer.read_varint()?)
            .map_err(|_| DecodeError::new(DecodeErrorKind::MalformedVarint, index_offset))?;
        let size_bits = buffer.read_f32()?.to_bits();
        let mut linear_bits = [0; 4];
        for bits in &mut linear_bits {
            *bits = buffer.read_f32()?.to_bits();
        }
        let edging = Edging::from_u8(buffer.read_u8()?)
            .ok_or_else(|| DecodeError::new(DecodeErrorKind::UnknownEdging, buffer.offset() - 1))?;
        let hinted = buffer.read_bool()?;
        let sdf = buffer.read_bool()?;
        Ok(Self {
            font_id,
            font_index,
            size_bits,
            linear_bits,
            edging,
            hinted,
            sdf,
        })
    }
}

/// Scaler-side glyph metrics source used while building sub-runs.
///
/// Implementations usually wrap a rasterizing glyph cache. Lookups may prime
/// that cache; the strike-calculations-only creation mode exists to do just
/// that.
pub trait StrikeForGpuCache {
    /// Image metrics of `glyph` in `strike`.
    ///
    /// Unknown glyphs should report [`GlyphMetrics::EMPTY`].
    fn glyph_metrics(&mut self, strike: &StrikeDescriptor, glyph: PackedGlyphId) -> GlyphMetrics;
}

/// Resolves font ids recorded by another process when sub-runs are
/// deserialized.
pub trait StrikeClient {
    /// The local font id for `remote_font_id`, or `None` if the font was
    /// never sent to this process.
    fn translate_font_id(&self, remote_font_id: u64) -> Option<u64>;
}

impl<S: BuildHasher> StrikeClient for HashMap<u64, u64, S> {
    fn translate_font_id(&self, remote_font_id: u64) -> Option<u64> {
        self.get(&remote_font_id).copied()
    }
}

/// GPU-side glyph records for one strike.
pub struct TextStrike {
    descriptor: StrikeDescriptor,
    glyphs: HashMap<PackedGlyphId, Glyph>,
}

impl TextStrike {
    fn new(descriptor: StrikeDescriptor) -> Self {
        Self {
            descriptor,
            glyphs: HashMap::new(),
        }
    }

    /// The strike's descriptor.
    pub fn descriptor(&self) -> &StrikeDescriptor {
        &self.descriptor
    }

    /// The shared record for `packed_id`, created unplaced on first use.
    pub fn glyph(&mut self, packed_id: PackedGlyphId) -> Glyph {
        *self
            .glyphs
            .entry(packed_id)
            .or_insert_with(|| Glyph::new(packed_id))
    }

    /// Records where `glyph` now lives in the atlas.
    pub fn update(&mut self, glyph: Glyph) {
        self.glyphs.insert(glyph.packed_id, glyph);
    }

    /// Number of glyph records in the strike.
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// Whether the strike holds no glyph records.
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

impl Debug for TextStrike {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TextStrike")
            .field("descriptor", &self.descriptor)
            .field("glyphs", &self.glyphs.len())
            .finish()
    }
}

/// GPU-side cache of [`TextStrike`]s keyed by descriptor.
#[derive(Default)]
pub struct StrikeCache {
    strikes: HashMap<StrikeDescriptor, TextStrike>,
    /// Number of lookups that found an existing strike.
    cache_hits: u64,
    /// Number of lookups that created a strike.
    cache_misses: u64,
}

impl StrikeCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the strike for `descriptor`, creating it if needed.
    pub fn find_or_create_strike(&mut self, descriptor: &StrikeDescriptor) -> &mut TextStrike {
        if self.strikes.contains_key(descriptor) {
            self.cache_hits += 1;
        } else {
            self.cache_misses += 1;
        }
        self.strikes
            .entry(*descriptor)
            .or_insert_with(|| TextStrike::new(*descriptor))
    }

    /// Number of strikes.
    pub fn len(&self) -> usize {
        self.strikes.len()
    }

    /// Whether the cache holds no strikes.
    pub fn is_empty(&self) -> bool {
        self.strikes.is_empty()
    }

    /// Drops every strike, for example after the atlas was reset.
    pub fn clear(&mut self) {
        self.strikes.clear();
    }

    /// Get the number of cache hits since last `clear_stats()`.
    #[inline]
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    /// Get the number of cache misses since last `clear_stats()`.
    #[inline]
    pub fn cache_misses(&self) -> u64 {
        self.cache_misses
    }

    /// Clear cache hit/miss statistics without clearing the cache itself.
    pub fn clear_stats(&mut self) {
        self.cache_hits = 0;
        self.cache_misses = 0;
    }
}

impl Debug for StrikeCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StrikeCache")
            .field("strikes", &self.strikes.len())
            .field("cache_hits", &self.cache_hits)
            .field("cache_misses", &self.cache_misses)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::GlyphId;

    fn descriptor(font_id: u64) -> StrikeDescriptor {
        let font = FontInstance::new(font_id, 0, 16.0);
        StrikeDescriptor::new(&font, 16.0, &Affine::scale(2.0), Edging::AntiAlias, false)
    }

    #[test]
    fn descriptor_round_trip() {
        let desc = descriptor(42);
        let mut w = WriteBuffer::new();
        desc.flatten(&mut w);
        let mut r = ReadBuffer::new(w.as_bytes());
        assert_eq!(StrikeDescriptor::make_from_buffer(&mut r, None), Ok(desc));
        assert!(r.is_exhausted(), "descriptor left trailing bytes");
        assert_eq!(desc.linear(), Affine::scale(2.0));
    }

    #[test]
    fn client_translates_font_ids() {
        let desc = descriptor(42);
        let mut w = WriteBuffer::new();
        desc.flatten(&mut w);

        let mut client = HashMap::new();
        client.insert(42_u64, 7_u64);
        let mut r = ReadBuffer::new(w.as_bytes());
        let local = StrikeDescriptor::make_from_buffer(&mut r, Some(&client)).unwrap();
        assert_eq!(local.font_id, 7);

        let empty: HashMap<u64, u64> = HashMap::new();
        let mut r = ReadBuffer::new(w.as_bytes());
        let err = StrikeDescriptor::make_from_buffer(&mut r, Some(&empty)).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::UnknownFont);
    }

    #[test]
    fn strike_cache_shares_glyph_records() {
        let mut cache = StrikeCache::new();
        let desc = descriptor(1);
        let id = PackedGlyphId::new(GlyphId::new(9), 0);
        let mut glyph = cache.find_or_create_strike(&desc).glyph(id);
        glyph.atlas_locator.generation = 3;
        cache.find_or_create_strike(&desc).update(glyph);

        let again = cache.find_or_create_strike(&desc).glyph(id);
        assert!(again.atlas_locator.is_resident());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.cache_misses(), 1);
        assert_eq!(cache.cache_hits(), 2);
    }
}
