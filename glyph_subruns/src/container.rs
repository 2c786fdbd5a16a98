// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The sub-runs of one text draw, and the factory that builds them.
//!
//! A [`SubRunContainer`] is the unit of caching: it records the position
//! matrix its sub-runs were built for, can tell whether they may be redrawn
//! under a new paint and matrix, and round-trips through a
//! [`WriteBuffer`]/[`ReadBuffer`] pair.
//!
//! ## Partitioning
//!
//! Each glyph is assigned one strategy, looked at in this order:
//! 1. Scaled distance field, when the device has an [`SdftControl`] whose
//!    range includes the run's device text size and the glyph is not a color
//!    glyph.
//! 2. Direct mask, when the glyph image rendered with the position matrix
//!    baked in is at most [`MAX_GLYPH_SIZE`] pixels in each dimension.
//! 3. Transformed mask, rendered at no more than
//!    [`MAX_TRANSFORMED_STRIKE_SIZE`] and scaled by the GPU, when that image
//!    fits.
//!
//! Glyphs without an image, and glyphs that fit nowhere, are skipped.
//! Consecutive glyphs of one run with the same strategy and mask format form
//! one sub-run.
//!
//! [`SdftControl`]: crate::SdftControl

use alloc::boxed::Box;
use alloc::vec::Vec;

use log::{debug, trace};
use smallvec::SmallVec;

use crate::allocator::{ArenaBox, SubRunAllocator};
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::device::{SdftMatrixRange, StrikeDeviceInfo};
use crate::error::{DecodeError, DecodeErrorKind};
use crate::glyph::{Glyph, MaskFormat, PackedGlyphId};
use crate::glyph_run::{FontInstance, GlyphRunList, PositionedGlyph};
use crate::glyph_vector::GlyphVector;
use crate::kurbo::{Affine, Point, Rect};
use crate::math::max_scale;
use crate::paint::{Edging, RunPaint};
use crate::strike::{StrikeClient, StrikeDescriptor, StrikeForGpuCache};
use crate::sub_run::{
    AtlasDrawDelegate, AtlasRunCore, DirectMaskSubRun, SdftSubRun, SubRun, SubRunStorage,
    SubRunVariant, TransformedMaskSubRun, MAX_GLYPH_SIZE, MAX_TRANSFORMED_STRIKE_SIZE,
};
use crate::sub_run_list::SubRunList;
use crate::vertex_filler::VertexFiller;

#[cfg(not(feature = "std"))]
use crate::kurbo::common::FloatFuncs as _;

/// Largest allocation size hint accepted from a stream.
const MAX_ALLOC_SIZE_HINT: usize = 1 << 28;

/// What [`SubRunContainer::make_in_alloc`] should do with the glyphs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SubRunCreationBehavior {
    /// Build and append sub-runs.
    AddSubRuns,
    /// Only look up glyph metrics, priming the strike cache; the container
    /// stays empty.
    StrikeCalculationsOnly,
}

/// Owner of a container allocated in a [`SubRunAllocator`].
pub type SubRunContainerOwner<'a> = ArenaBox<'a, SubRunContainer<'a>>;

/// Sub-runs in drawing order, plus the position matrix they were built for.
///
/// Sub-run geometry is stored relative to the initial position matrix, which
/// never changes after construction.
#[derive(Debug)]
pub struct SubRunContainer<'a> {
    initial_position_matrix: Affine,
    sub_runs: SubRunList<'a>,
}

impl<'a> SubRunContainer<'a> {
    /// Creates an empty container for sub-runs built under
    /// `initial_position_matrix`.
    pub fn new(initial_position_matrix: Affine) -> Self {
        Self {
            initial_position_matrix,
            sub_runs: SubRunList::new(),
        }
    }

    /// The position matrix the sub-runs were built for.
    #[inline]
    pub fn initial_position(&self) -> Affine {
        self.initial_position_matrix
    }

    /// Whether the container holds no sub-runs.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sub_runs.is_empty()
    }

    /// The sub-runs, in drawing order.
    #[inline]
    pub fn sub_runs(&self) -> &SubRunList<'a> {
        &self.sub_runs
    }

    /// Builds the sub-runs for `glyph_run_list` drawn under
    /// `position_matrix`, allocating them and the container in `alloc`.
    ///
    /// Glyph positions are mapped to device space by `position_matrix`. With
    /// [`SubRunCreationBehavior::StrikeCalculationsOnly`] glyph metrics are
    /// still looked up but nothing is appended. `tag` labels log output.
    pub fn make_in_alloc(
        glyph_run_list: &GlyphRunList,
        position_matrix: &Affine,
        paint: &RunPaint,
        device_info: &StrikeDeviceInfo,
        strike_cache: &mut dyn StrikeForGpuCache,
        alloc: &'a SubRunAllocator,
        creation_behavior: SubRunCreationBehavior,
        tag: &str,
    ) -> SubRunContainerOwner<'a> {
        let mut container = Self::new(*position_matrix);
        let add_sub_runs = creation_behavior == SubRunCreationBehavior::AddSubRuns;
        let builder = Builder {
            alloc,
            position_matrix: *position_matrix,
            paint,
            use_lcd: paint.edging == Edging::SubpixelAntiAlias && device_info.lcd_allowed,
        };
        let sub_runs = &mut container.sub_runs;
        let counts = partition(
            glyph_run_list,
            position_matrix,
            mask_edging(paint, device_info),
            device_info,
            strike_cache,
            tag,
            |kind, strikes, glyphs| {
                if add_sub_runs {
                    builder.build(kind, strikes, glyphs, sub_runs);
                }
            },
        );

        trace!(
            "{tag}: {} sub-runs for {} of {} glyphs ({:?})",
            container.sub_runs.len(),
            counts.glyphs,
            glyph_run_list.total_glyph_count(),
            creation_behavior,
        );
        alloc.make_unique(container)
    }

    /// Arena bytes [`SubRunContainer::make_in_alloc`] needs for the same
    /// inputs.
    ///
    /// Runs the glyph partition without building anything, so the strike
    /// cache is primed as with [`SubRunCreationBehavior::StrikeCalculationsOnly`].
    pub fn estimate_alloc_size(
        glyph_run_list: &GlyphRunList,
        position_matrix: &Affine,
        paint: &RunPaint,
        device_info: &StrikeDeviceInfo,
        strike_cache: &mut dyn StrikeForGpuCache,
    ) -> usize {
        let counts = partition(
            glyph_run_list,
            position_matrix,
            mask_edging(paint, device_info),
            device_info,
            strike_cache,
            "estimate",
            |_, _, _| {},
        );
        size_of::<Self>()
            + counts.groups * size_of::<SubRunVariant>()
            + counts.glyphs * (size_of::<Glyph>() + size_of::<Point>())
    }

    /// Draws every sub-run, in order, through `delegate`.
    pub fn draw(
        &self,
        draw_origin: Point,
        paint: &RunPaint,
        storage: &SubRunStorage,
        delegate: &mut dyn AtlasDrawDelegate,
    ) {
        for sub_run in &self.sub_runs {
            sub_run.draw(draw_origin, paint, storage, delegate);
        }
    }

    /// Whether every sub-run can be redrawn with `paint` under
    /// `position_matrix`.
    pub fn can_reuse(&self, paint: &RunPaint, position_matrix: &Affine) -> bool {
        self.sub_runs
            .iter()
            .all(|sub_run| sub_run.can_reuse(paint, position_matrix))
    }

    /// Writes the arena size a reader needs to rebuild this container.
    pub fn flatten_alloc_size_hint(&self, buffer: &mut WriteBuffer) {
        let hint: usize = size_of::<Self>()
            + self
                .sub_runs
                .iter()
                .map(SubRun::unflatten_size)
                .sum::<usize>();
        buffer.write_usize(hint);
    }

    /// Reads the size hint of the container at the reader's position, without
    /// advancing the reader.
    pub fn alloc_size_hint_from_buffer(buffer: &ReadBuffer<'_>) -> Result<usize, DecodeError> {
        let mut peek = buffer.clone();
        peek.read_affine()?;
        read_size_hint(&mut peek)
    }

    /// Writes the position matrix, size hint and every sub-run.
    pub fn flatten_runs(&self, buffer: &mut WriteBuffer) {
        buffer.write_affine(&self.initial_position_matrix);
        self.flatten_alloc_size_hint(buffer);
        buffer.write_usize(self.sub_runs.len());
        for sub_run in &self.sub_runs {
            sub_run.flatten(buffer);
        }
    }

    /// Rebuilds a container written by [`SubRunContainer::flatten_runs`].
    ///
    /// Font ids are translated through `client` when one is given. Any
    /// malformed sub-run fails the whole container.
    pub fn make_from_buffer_in_alloc(
        buffer: &mut ReadBuffer<'_>,
        client: Option<&dyn StrikeClient>,
        alloc: &'a SubRunAllocator,
    ) -> Result<SubRunContainerOwner<'a>, DecodeError> {
        let result = Self::read_runs(buffer, client, alloc);
        if let Err(err) = &result {
            debug!("failed to rebuild sub-run container: {err}");
        }
        result.map(|container| alloc.make_unique(container))
    }

    fn read_runs(
        buffer: &mut ReadBuffer<'_>,
        client: Option<&dyn StrikeClient>,
        alloc: &'a SubRunAllocator,
    ) -> Result<Self, DecodeError> {
        let matrix = buffer.read_affine()?;
        read_size_hint(buffer)?;
        // Every sub-run takes at least its tag byte.
        let count = buffer.read_count(1)?;
        let mut container = Self::new(matrix);
        for _ in 0..count {
            let sub_run = SubRunVariant::make_from_buffer(buffer, alloc, client)?;
            container.sub_runs.append(sub_run);
        }
        Ok(container)
    }
}

/// The edging glyph masks are rasterized with; LCD coverage is only produced
/// for surfaces that can show it.
fn mask_edging(paint: &RunPaint, device_info: &StrikeDeviceInfo) -> Edging {
    match paint.edging {
        Edging::SubpixelAntiAlias if !device_info.lcd_allowed => Edging::AntiAlias,
        edging => edging,
    }
}

fn read_size_hint(buffer: &mut ReadBuffer<'_>) -> Result<usize, DecodeError> {
    let offset = buffer.offset();
    let hint = buffer.read_usize()?;
    if hint > MAX_ALLOC_SIZE_HINT {
        return Err(DecodeError::new(DecodeErrorKind::SizeHintTooLarge, offset));
    }
    Ok(hint)
}

/// Reads a point list, allocating the points in `alloc`.
///
/// A malformed or truncated list yields no points; the caller decides
/// whether that is acceptable.
pub fn make_points_from_buffer(buffer: &mut ReadBuffer<'_>, alloc: &SubRunAllocator) -> Box<[Point]> {
    match read_points(buffer) {
        Ok(points) => alloc.make_slice(points),
        Err(err) => {
            debug!("discarding malformed point list: {err}");
            Box::default()
        }
    }
}

fn read_points(buffer: &mut ReadBuffer<'_>) -> Result<Vec<Point>, DecodeError> {
    let count = buffer.read_count(2 * size_of::<f32>())?;
    let mut points = Vec::with_capacity(count);
    for _ in 0..count {
        points.push(buffer.read_point()?);
    }
    Ok(points)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Strategy {
    Direct,
    Transformed,
    Sdft,
}

/// A glyph waiting to be grouped into a sub-run.
#[derive(Clone, Copy, Debug)]
struct PendingGlyph {
    packed_id: PackedGlyphId,
    /// Top-left corner of the glyph quad, relative to the filler's creation
    /// matrix.
    left_top: Point,
    quad: Rect,
}

/// The strikes one glyph run may use.
struct RunStrikes {
    direct: StrikeDescriptor,
    transformed: StrikeDescriptor,
    /// Source units per transformed strike pixel.
    transformed_scale: f64,
    sdft: Option<SdftStrike>,
}

struct SdftStrike {
    strike: StrikeDescriptor,
    /// Source units per distance-field strike pixel.
    scale: f64,
    range: SdftMatrixRange,
}

impl RunStrikes {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "text sizes are f32 throughout"
    )]
    fn new(
        font: &FontInstance,
        position_matrix: &Affine,
        device_scale: f64,
        mask_edging: Edging,
        device_info: &StrikeDeviceInfo,
    ) -> Self {
        let device_size = (f64::from(font.size) * device_scale) as f32;
        let sdft = device_info
            .sdft_control
            .filter(|control| control.is_sdft(device_size))
            .map(|control| {
                let (size, range) = control.sdf_strike_size_and_range(font.size, device_size);
                SdftStrike {
                    strike: StrikeDescriptor::new(
                        font,
                        size,
                        &Affine::IDENTITY,
                        Edging::AntiAlias,
                        true,
                    ),
                    scale: f64::from(font.size) / f64::from(size),
                    range,
                }
            });
        let transformed_size = font.size.min(MAX_TRANSFORMED_STRIKE_SIZE);
        Self {
            direct: StrikeDescriptor::new(font, font.size, position_matrix, mask_edging, false),
            transformed: StrikeDescriptor::new(
                font,
                transformed_size,
                &Affine::IDENTITY,
                mask_edging,
                false,
            ),
            transformed_scale: f64::from(font.size) / f64::from(transformed_size),
            sdft,
        }
    }
}

type GroupKey = (Strategy, MaskFormat);

/// Sub-runs and glyphs produced by one partition walk.
#[derive(Clone, Copy, Debug, Default)]
struct PartitionCounts {
    groups: usize,
    glyphs: usize,
}

/// Classifies every glyph of `glyph_run_list` and hands each group of
/// consecutive same-kind glyphs of one run to `emit`, in order.
fn partition(
    glyph_run_list: &GlyphRunList,
    position_matrix: &Affine,
    mask_edging: Edging,
    device_info: &StrikeDeviceInfo,
    strike_cache: &mut dyn StrikeForGpuCache,
    tag: &str,
    mut emit: impl FnMut(GroupKey, &RunStrikes, &[PendingGlyph]),
) -> PartitionCounts {
    let device_scale = max_scale(position_matrix);
    let mut counts = PartitionCounts::default();
    let mut pending: SmallVec<[PendingGlyph; 32]> = SmallVec::new();
    for run in &glyph_run_list.runs {
        let strikes = RunStrikes::new(
            &run.font,
            position_matrix,
            device_scale,
            mask_edging,
            device_info,
        );
        let mut current = None;
        for glyph in &run.glyphs {
            let Some((kind, placed)) =
                classify(glyph, &strikes, position_matrix, mask_edging, strike_cache)
            else {
                trace!("{tag}: skipping glyph {}", glyph.id.to_u32());
                continue;
            };
            if current != Some(kind) {
                if let Some(done) = current {
                    emit(done, &strikes, pending.as_slice());
                    pending.clear();
                }
                current = Some(kind);
                counts.groups += 1;
            }
            counts.glyphs += 1;
            pending.push(placed);
        }
        if let Some(done) = current {
            emit(done, &strikes, pending.as_slice());
            pending.clear();
        }
    }
    counts
}

/// Picks the strategy for `glyph`, or `None` if it has no image or fits
/// nowhere.
fn classify(
    glyph: &PositionedGlyph,
    strikes: &RunStrikes,
    position_matrix: &Affine,
    mask_edging: Edging,
    strike_cache: &mut dyn StrikeForGpuCache,
) -> Option<(GroupKey, PendingGlyph)> {
    let source = glyph.position();

    if let Some(sdft) = &strikes.sdft {
        let packed_id = PackedGlyphId::new(glyph.id, 0);
        let metrics = strike_cache.glyph_metrics(&sdft.strike, packed_id);
        if metrics.is_empty() {
            return None;
        }
        if !metrics.is_color && metrics.fits_within(MAX_GLYPH_SIZE) {
            let quad = source_quad(source, metrics.bounds, sdft.scale);
            return Some((
                (Strategy::Sdft, MaskFormat::A8),
                PendingGlyph {
                    packed_id,
                    left_top: quad.origin(),
                    quad,
                },
            ));
        }
    }

    let device = *position_matrix * source;
    let packed_id = PackedGlyphId::with_fractional_x(glyph.id, device.x);
    let metrics = strike_cache.glyph_metrics(&strikes.direct, packed_id);
    if metrics.is_empty() {
        return None;
    }
    let format = if metrics.is_color {
        MaskFormat::Argb
    } else {
        mask_edging.mask_format()
    };
    if metrics.fits_within(MAX_GLYPH_SIZE) {
        let origin = Point::new(
            (device.x - packed_id.subpixel_offset()).round(),
            device.y.round(),
        );
        let quad = metrics.bounds + origin.to_vec2();
        return Some((
            (Strategy::Direct, format),
            PendingGlyph {
                packed_id,
                left_top: quad.origin(),
                quad,
            },
        ));
    }

    let packed_id = PackedGlyphId::new(glyph.id, 0);
    let metrics = strike_cache.glyph_metrics(&strikes.transformed, packed_id);
    if metrics.is_empty() || !metrics.fits_within(MAX_GLYPH_SIZE) {
        return None;
    }
    let quad = source_quad(source, metrics.bounds, strikes.transformed_scale);
    Some((
        (Strategy::Transformed, format),
        PendingGlyph {
            packed_id,
            left_top: quad.origin(),
            quad,
        },
    ))
}

/// The source-space quad of a glyph image with strike-space `bounds`.
fn source_quad(origin: Point, bounds: Rect, scale: f64) -> Rect {
    Rect::from_origin_size(
        origin + bounds.origin().to_vec2() * scale,
        bounds.size() * scale,
    )
}

/// Turns groups of classified glyphs into sub-runs.
struct Builder<'a, 'p> {
    alloc: &'a SubRunAllocator,
    position_matrix: Affine,
    paint: &'p RunPaint,
    use_lcd: bool,
}

impl<'a> Builder<'a, '_> {
    fn build(
        &self,
        (strategy, format): GroupKey,
        strikes: &RunStrikes,
        pending: &[PendingGlyph],
        list: &mut SubRunList<'a>,
    ) {
        if pending.is_empty() {
            return;
        }
        let alloc = self.alloc;
        let bounds = pending
            .iter()
            .map(|glyph| glyph.quad)
            .reduce(|a, b| a.union(b))
            .unwrap_or(Rect::ZERO);
        let left_top = alloc.make_slice(pending.iter().map(|glyph| glyph.left_top));
        let ids = pending.iter().map(|glyph| glyph.packed_id);
        let edging = self.paint.edging;

        let variant = match strategy {
            Strategy::Direct => {
                let filler =
                    VertexFiller::new(format, true, self.position_matrix, bounds, left_top, 1.0);
                let glyphs = GlyphVector::from_packed_ids(strikes.direct, ids, alloc);
                SubRunVariant::DirectMask(DirectMaskSubRun::new(
                    AtlasRunCore::new(filler, glyphs),
                    edging,
                ))
            }
            Strategy::Transformed => {
                let filler = VertexFiller::new(
                    format,
                    false,
                    Affine::IDENTITY,
                    bounds,
                    left_top,
                    to_f32(strikes.transformed_scale),
                );
                let glyphs = GlyphVector::from_packed_ids(strikes.transformed, ids, alloc);
                SubRunVariant::TransformedMask(TransformedMaskSubRun::new(
                    AtlasRunCore::new(filler, glyphs),
                    edging,
                ))
            }
            Strategy::Sdft => {
                let Some(sdft) = &strikes.sdft else {
                    return;
                };
                let filler = VertexFiller::new(
                    MaskFormat::A8,
                    false,
                    Affine::IDENTITY,
                    bounds,
                    left_top,
                    to_f32(sdft.scale),
                );
                let glyphs = GlyphVector::from_packed_ids(sdft.strike, ids, alloc);
                SubRunVariant::Sdft(SdftSubRun::new(
                    AtlasRunCore::new(filler, glyphs),
                    edging,
                    self.use_lcd,
                    sdft.range,
                ))
            }
        };
        list.append(alloc.make_unique(variant));
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "strike scales are stored at f32 precision"
)]
#[inline]
fn to_f32(value: f64) -> f32 {
    value as f32
}
