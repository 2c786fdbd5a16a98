// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sub-runs: maximal runs of glyphs that share one rendering strategy.
//!
//! Every sub-run implements [`SubRun`], which covers drawing, reuse checks and
//! serialization. Atlas-backed sub-runs also implement [`AtlasSubRun`], the
//! contract a GPU renderer uses to keep glyph images resident and to generate
//! vertices:
//! - [`DirectMaskSubRun`] draws device-space masks that need no transform.
//! - [`TransformedMaskSubRun`] draws source-space masks through the draw
//!   transform.
//! - [`SdftSubRun`] draws scaled signed distance fields.
//!
//! The variants form the closed [`SubRunVariant`] set; the serialized stream
//! tag of each node names one of them.

mod direct;
mod sdft;
mod transformed;

pub use direct::DirectMaskSubRun;
pub use sdft::SdftSubRun;
pub use transformed::TransformedMaskSubRun;

use alloc::rc::Rc;
use core::any::Any;
use core::cell::{Ref, RefCell};
use core::fmt::{Debug, Formatter};
use core::marker::PhantomData;

use crate::allocator::{ArenaBox, SubRunAllocator};
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::color::{AlphaColor, Srgb};
use crate::error::{DecodeError, DecodeErrorKind};
use crate::glyph::{Glyph, MaskFormat};
use crate::glyph_vector::GlyphVector;
use crate::kurbo::{Affine, Point, Rect};
use crate::paint::{Edging, RunPaint};
use crate::strike::{StrikeCache, StrikeClient};
use crate::vertex_filler::VertexFiller;

/// Largest width or height, in pixels, of a glyph image stored in the atlas.
pub const MAX_GLYPH_SIZE: u16 = 256;

/// Largest strike size used for transformed masks.
pub const MAX_TRANSFORMED_STRIKE_SIZE: f32 = 128.0;

/// Atlas padding around direct masks.
pub const DIRECT_MASK_PADDING: u32 = 0;

/// Atlas padding around transformed masks, so bilinear sampling does not
/// bleed into neighbors.
pub const TRANSFORMED_MASK_PADDING: u32 = 1;

/// Atlas padding around distance fields; the field extends past the outline.
pub const DISTANCE_FIELD_PADDING: u32 = 4;

/// Identifies the concrete kind of a serialized sub-run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SubRunStreamTag {
    /// [`DirectMaskSubRun`].
    DirectMask = 1,
    /// [`TransformedMaskSubRun`].
    TransformedMask = 2,
    /// [`SdftSubRun`].
    Sdft = 3,
}

impl SubRunStreamTag {
    /// Decodes a tag byte; `0` and unassigned values are `None`.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::DirectMask),
            2 => Some(Self::TransformedMask),
            3 => Some(Self::Sdft),
            _ => None,
        }
    }
}

/// What a renderer needs to pick a pipeline for a sub-run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RendererData {
    /// The sub-run holds distance fields.
    pub is_sdf: bool,
    /// The sub-run uses LCD coverage.
    pub is_lcd: bool,
    /// The atlas format of the glyph images.
    pub mask_format: MaskFormat,
}

/// Shader-relevant properties of an atlas sub-run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GlyphParams {
    /// The sub-run holds distance fields.
    pub is_sdf: bool,
    /// The sub-run uses LCD coverage.
    pub is_lcd: bool,
    /// Glyph edges are antialiased.
    pub is_aa: bool,
}

/// Keeps whatever backs a sub-run alive for as long as a recorded draw needs
/// it.
///
/// Draw delegates receive a clone of the token with every sub-run, so they
/// can hold on to it past the draw call.
#[derive(Clone, Default)]
pub struct SubRunStorage(Option<Rc<dyn Any>>);

impl SubRunStorage {
    /// A token that keeps `owner` alive.
    pub fn new(owner: Rc<dyn Any>) -> Self {
        Self(Some(owner))
    }

    /// A token that keeps nothing alive.
    pub fn none() -> Self {
        Self(None)
    }

    /// The object this token keeps alive.
    pub fn get(&self) -> Option<&Rc<dyn Any>> {
        self.0.as_ref()
    }
}

impl Debug for SubRunStorage {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("SubRunStorage")
            .field(&self.0.is_some())
            .finish()
    }
}

/// Capability to mutate glyph residency during the prepare phase.
///
/// Atlas regeneration requires `&mut PreparePass`, so at most one regeneration
/// runs at a time per token. The token is neither `Send` nor `Sync`, and
/// sub-runs are not `Sync`, so preparation stays on the thread that owns the
/// sub-runs.
#[derive(Debug, Default)]
pub struct PreparePass {
    _not_send: PhantomData<*const ()>,
}

impl PreparePass {
    /// Begins a prepare pass.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Caller-supplied draw step for atlas sub-runs.
///
/// Implemented for closures with the same signature.
pub trait AtlasDrawDelegate {
    /// Draws `sub_run` at `draw_origin` with `paint`.
    fn draw(
        &mut self,
        sub_run: &dyn AtlasSubRun,
        draw_origin: Point,
        paint: &RunPaint,
        storage: SubRunStorage,
        renderer_data: RendererData,
    );
}

impl<F> AtlasDrawDelegate for F
where
    F: FnMut(&dyn AtlasSubRun, Point, &RunPaint, SubRunStorage, RendererData),
{
    fn draw(
        &mut self,
        sub_run: &dyn AtlasSubRun,
        draw_origin: Point,
        paint: &RunPaint,
        storage: SubRunStorage,
        renderer_data: RendererData,
    ) {
        self(sub_run, draw_origin, paint, storage, renderer_data);
    }
}

/// Caller-supplied atlas upload step.
///
/// Implemented for closures with the same signature.
pub trait RegenerateAtlasDelegate {
    /// Makes glyphs `begin..end` of `glyphs` resident, recording their new
    /// placement in the vector.
    ///
    /// Returns whether every glyph in the range is resident, and how many
    /// glyphs starting at `begin` can be drawn.
    fn regenerate(
        &mut self,
        glyphs: &mut GlyphVector,
        begin: usize,
        end: usize,
        mask_format: MaskFormat,
        padding: u32,
    ) -> (bool, usize);
}

impl<F> RegenerateAtlasDelegate for F
where
    F: FnMut(&mut GlyphVector, usize, usize, MaskFormat, u32) -> (bool, usize),
{
    fn regenerate(
        &mut self,
        glyphs: &mut GlyphVector,
        begin: usize,
        end: usize,
        mask_format: MaskFormat,
        padding: u32,
    ) -> (bool, usize) {
        self(glyphs, begin, end, mask_format, padding)
    }
}

/// The basic sub-run contract: drawing, reuse and serialization.
pub trait SubRun {
    /// Draws the sub-run at `draw_origin`.
    ///
    /// Atlas sub-runs hand themselves to `delegate`, which can then regenerate
    /// the atlas and fill vertices.
    fn draw(
        &self,
        draw_origin: Point,
        paint: &RunPaint,
        storage: &SubRunStorage,
        delegate: &mut dyn AtlasDrawDelegate,
    );

    /// Writes the stream tag followed by the payload.
    fn flatten(&self, buffer: &mut WriteBuffer) {
        buffer.write_u8(self.sub_run_stream_tag() as u8);
        self.do_flatten(buffer);
    }

    /// Writes the variant payload.
    fn do_flatten(&self, buffer: &mut WriteBuffer);

    /// The tag naming this variant in a serialized stream.
    fn sub_run_stream_tag(&self) -> SubRunStreamTag;

    /// Approximate arena bytes this sub-run needs once deserialized.
    fn unflatten_size(&self) -> usize;

    /// Whether the sub-run can be redrawn with `paint` under
    /// `position_matrix` without rebuilding it.
    ///
    /// Answers `false` whenever in doubt.
    fn can_reuse(&self, paint: &RunPaint, position_matrix: &Affine) -> bool;

    /// This sub-run as an atlas sub-run, for tests and diagnostics.
    fn testing_only_atlas_sub_run(&self) -> Option<&dyn AtlasSubRun>;
}

/// The contract between atlas-backed sub-runs and a GPU renderer.
///
/// Variants supply [`AtlasSubRun::atlas_core`], their padding and their glyph
/// parameters; everything else has a shared implementation.
pub trait AtlasSubRun: SubRun {
    /// The filler and glyphs shared by every atlas variant.
    fn atlas_core(&self) -> &AtlasRunCore;

    /// Padding, in atlas texels, required around each glyph image.
    fn glyph_src_padding(&self) -> u32;

    /// Shader-relevant properties of the sub-run.
    fn glyph_params(&self) -> GlyphParams;

    /// The glyphs and their current atlas placement.
    ///
    /// # Panics
    ///
    /// Panics if called from inside a [`RegenerateAtlasDelegate`] working on
    /// this sub-run.
    fn glyphs(&self) -> Ref<'_, [Glyph]> {
        Ref::map(self.atlas_core().glyphs.borrow(), GlyphVector::glyphs)
    }

    /// Number of glyphs.
    fn glyph_count(&self) -> usize {
        self.atlas_core().filler.glyph_count()
    }

    /// The atlas format of the glyph images.
    fn mask_format(&self) -> MaskFormat {
        self.atlas_core().filler.mask_format()
    }

    /// The mask format as a small integer for per-instance shader data.
    fn instance_flags(&self) -> u32 {
        u32::from(self.mask_format() as u8)
    }

    /// The glyph geometry.
    fn vertex_filler(&self) -> &VertexFiller {
        &self.atlas_core().filler
    }

    /// What the renderer needs to pick a pipeline.
    fn renderer_data(&self) -> RendererData {
        let params = self.glyph_params();
        RendererData {
            is_sdf: params.is_sdf,
            is_lcd: params.is_lcd,
            mask_format: self.mask_format(),
        }
    }

    /// Bounds under `position_matrix`, and whether glyphs must be
    /// transformed rather than translated.
    fn device_rect_and_needs_transform(&self, position_matrix: &Affine) -> (bool, Rect) {
        self.atlas_core()
            .filler
            .device_rect_and_needs_transform(position_matrix)
    }

    /// Byte size of one vertex when drawing under `position_matrix`.
    fn vertex_stride(&self, position_matrix: &Affine) -> usize {
        self.atlas_core().filler.vertex_stride(position_matrix)
    }

    /// Writes vertices for `count` glyphs starting at `offset`, returning the
    /// number of glyph quads written.
    ///
    /// The position matrix is `draw_matrix` applied after a translation to
    /// `draw_origin`.
    fn fill_vertex_data(
        &self,
        dst: &mut [u8],
        offset: usize,
        count: usize,
        color: AlphaColor<Srgb>,
        draw_matrix: &Affine,
        draw_origin: Point,
        clip: Option<Rect>,
    ) -> usize {
        let core = self.atlas_core();
        let Ok(glyphs) = core.glyphs.try_borrow() else {
            log::warn!("vertex fill requested while the atlas is regenerating this sub-run");
            return 0;
        };
        let position_matrix = *draw_matrix * Affine::translate(draw_origin.to_vec2());
        core.filler.fill_vertex_data(
            dst,
            offset,
            count,
            color,
            glyphs.glyphs(),
            &position_matrix,
            clip,
        )
    }

    /// Makes glyphs `begin..end` resident through `delegate`.
    ///
    /// Returns `(true, len)` when the whole (clamped) range is resident, or
    /// `(false, n)` when only the first `n` glyphs can be drawn.
    fn regenerate_atlas(
        &self,
        pass: &mut PreparePass,
        begin: usize,
        end: usize,
        delegate: &mut dyn RegenerateAtlasDelegate,
    ) -> (bool, usize) {
        self.atlas_core().regenerate_atlas(
            pass,
            begin,
            end,
            self.glyph_src_padding(),
            delegate,
        )
    }

    /// Resolves every glyph against `strike_cache`, for tests.
    fn testing_only_packed_glyph_id_to_glyph(
        &self,
        _pass: &mut PreparePass,
        strike_cache: &mut StrikeCache,
    ) {
        match self.atlas_core().glyphs.try_borrow_mut() {
            Ok(mut glyphs) => glyphs.packed_glyph_id_to_glyph(strike_cache),
            Err(_) => log::warn!("glyphs are borrowed; skipping strike cache resolution"),
        }
    }
}

/// State shared by every atlas sub-run: its geometry and its glyphs.
pub struct AtlasRunCore {
    filler: VertexFiller,
    glyphs: RefCell<GlyphVector>,
}

impl AtlasRunCore {
    pub(crate) fn new(filler: VertexFiller, glyphs: GlyphVector) -> Self {
        Self {
            filler,
            glyphs: RefCell::new(glyphs),
        }
    }

    /// Whether glyph images made for this run suit `paint`.
    ///
    /// Color glyphs ignore edging; coverage glyphs need the edging they were
    /// built with.
    fn edging_compatible(&self, creation_edging: Edging, paint: &RunPaint) -> bool {
        self.filler.mask_format().is_color() || paint.edging == creation_edging
    }

    fn glyph_params(&self, creation_edging: Edging) -> GlyphParams {
        GlyphParams {
            is_sdf: false,
            is_lcd: self.filler.mask_format() == MaskFormat::A565,
            is_aa: creation_edging.is_antialiased(),
        }
    }

    fn regenerate_atlas(
        &self,
        _pass: &mut PreparePass,
        begin: usize,
        end: usize,
        padding: u32,
        delegate: &mut dyn RegenerateAtlasDelegate,
    ) -> (bool, usize) {
        let Ok(mut glyphs) = self.glyphs.try_borrow_mut() else {
            log::warn!("atlas regeneration requested while glyphs are borrowed");
            return (false, 0);
        };
        let end = end.min(glyphs.len());
        let begin = begin.min(end);
        let len = end - begin;
        let (done, usable) =
            delegate.regenerate(&mut glyphs, begin, end, self.filler.mask_format(), padding);
        let usable = usable.min(len);
        (done && usable == len, usable)
    }

    fn unflatten_size(&self) -> usize {
        self.filler.unflatten_size() + self.glyphs.borrow().unflatten_size()
    }

    fn flatten(&self, buffer: &mut WriteBuffer) {
        self.filler.flatten(buffer);
        self.glyphs.borrow().flatten(buffer);
    }

    fn make_from_buffer(
        buffer: &mut ReadBuffer<'_>,
        alloc: &SubRunAllocator,
        client: Option<&dyn StrikeClient>,
    ) -> Result<Self, DecodeError> {
        let filler = VertexFiller::make_from_buffer(buffer, alloc)?;
        let offset = buffer.offset();
        let glyphs = GlyphVector::make_from_buffer(buffer, client, alloc)?;
        if glyphs.len() != filler.glyph_count() {
            return Err(DecodeError::new(DecodeErrorKind::GlyphCountMismatch, offset));
        }
        Ok(Self::new(filler, glyphs))
    }
}

impl Debug for AtlasRunCore {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AtlasRunCore")
            .field("mask_format", &self.filler.mask_format())
            .field("glyph_count", &self.filler.glyph_count())
            .finish_non_exhaustive()
    }
}

fn read_edging(buffer: &mut ReadBuffer<'_>) -> Result<Edging, DecodeError> {
    let offset = buffer.offset();
    Edging::from_u8(buffer.read_u8()?).ok_or(DecodeError::new(DecodeErrorKind::UnknownEdging, offset))
}

/// One of the closed set of sub-run kinds.
#[derive(Debug)]
pub enum SubRunVariant {
    /// Device-space masks.
    DirectMask(DirectMaskSubRun),
    /// Source-space masks drawn through a transform.
    TransformedMask(TransformedMaskSubRun),
    /// Scaled distance fields.
    Sdft(SdftSubRun),
}

/// Owner of a sub-run allocated in a [`SubRunAllocator`].
pub type SubRunOwner<'a> = ArenaBox<'a, SubRunVariant>;

impl SubRunVariant {
    /// The sub-run as an atlas sub-run.
    pub fn as_atlas(&self) -> &dyn AtlasSubRun {
        match self {
            Self::DirectMask(run) => run,
            Self::TransformedMask(run) => run,
            Self::Sdft(run) => run,
        }
    }

    /// Reads one tagged sub-run and allocates it in `alloc`.
    ///
    /// Dispatches purely on the leading tag byte. An unknown tag or a
    /// malformed payload is an error.
    pub fn make_from_buffer<'a>(
        buffer: &mut ReadBuffer<'_>,
        alloc: &'a SubRunAllocator,
        client: Option<&dyn StrikeClient>,
    ) -> Result<SubRunOwner<'a>, DecodeError> {
        let offset = buffer.offset();
        let tag = SubRunStreamTag::from_u8(buffer.read_u8()?)
            .ok_or(DecodeError::new(DecodeErrorKind::UnknownStreamTag, offset))?;
        let variant = match tag {
            SubRunStreamTag::DirectMask => {
                Self::DirectMask(DirectMaskSubRun::make_from_buffer(buffer, alloc, client)?)
            }
            SubRunStreamTag::TransformedMask => Self::TransformedMask(
                TransformedMaskSubRun::make_from_buffer(buffer, alloc, client)?,
            ),
            SubRunStreamTag::Sdft => {
                Self::Sdft(SdftSubRun::make_from_buffer(buffer, alloc, client)?)
            }
        };
        Ok(alloc.make_unique(variant))
    }
}

impl SubRun for SubRunVariant {
    fn draw(
        &self,
        draw_origin: Point,
        paint: &RunPaint,
        storage: &SubRunStorage,
        delegate: &mut dyn AtlasDrawDelegate,
    ) {
        self.as_atlas().draw(draw_origin, paint, storage, delegate);
    }

    fn do_flatten(&self, buffer: &mut WriteBuffer) {
        self.as_atlas().do_flatten(buffer);
    }

    fn sub_run_stream_tag(&self) -> SubRunStreamTag {
        self.as_atlas().sub_run_stream_tag()
    }

    fn unflatten_size(&self) -> usize {
        self.as_atlas().unflatten_size()
    }

    fn can_reuse(&self, paint: &RunPaint, position_matrix: &Affine) -> bool {
        self.as_atlas().can_reuse(paint, position_matrix)
    }

    fn testing_only_atlas_sub_run(&self) -> Option<&dyn AtlasSubRun> {
        Some(self.as_atlas())
    }
}
