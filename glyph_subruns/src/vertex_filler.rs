// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-glyph quad geometry for atlas sub-runs.
//!
//! A [`VertexFiller`] remembers where each glyph image sits relative to the
//! matrix the sub-run was built with. Direct fillers store device-space
//! top-left corners and can be redrawn as plain 2D quads when the new matrix
//! only moves them by whole pixels. Everything else is drawn with transformed
//! quads that also carry the creation-space position of each corner.

use alloc::boxed::Box;

use bytemuck::{Pod, Zeroable};

use crate::allocator::SubRunAllocator;
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::color::{AlphaColor, Srgb};
use crate::container::make_points_from_buffer;
use crate::error::{DecodeError, DecodeErrorKind};
use crate::glyph::{Glyph, MaskFormat};
use crate::kurbo::{Affine, Point, Rect, Vec2};
use crate::math::{is_invertible, translation_delta, FloatExt as _};

#[cfg(not(feature = "std"))]
use crate::kurbo::common::FloatFuncs as _;

/// Vertex of a coverage glyph drawn as an untransformed quad.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Zeroable, Pod)]
pub struct Mask2DVertex {
    /// Device position.
    pub position: [f32; 2],
    /// Premultiplied RGBA8 color.
    pub color: u32,
    /// Atlas texel coordinates.
    pub uv: [u16; 2],
}

/// Vertex of a color glyph drawn as an untransformed quad.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Zeroable, Pod)]
pub struct Argb2DVertex {
    /// Device position.
    pub position: [f32; 2],
    /// Atlas texel coordinates.
    pub uv: [u16; 2],
}

/// Vertex of a coverage glyph drawn through an arbitrary transform.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Zeroable, Pod)]
pub struct MaskTransformedVertex {
    /// Device position.
    pub position: [f32; 2],
    /// Position before the draw transform was applied.
    pub local: [f32; 2],
    /// Premultiplied RGBA8 color.
    pub color: u32,
    /// Atlas texel coordinates.
    pub uv: [u16; 2],
}

/// Vertex of a color glyph drawn through an arbitrary transform.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Zeroable, Pod)]
pub struct ArgbTransformedVertex {
    /// Device position.
    pub position: [f32; 2],
    /// Position before the draw transform was applied.
    pub local: [f32; 2],
    /// Atlas texel coordinates.
    pub uv: [u16; 2],
}

/// Glyph placement of one atlas sub-run, and the code that turns it into
/// vertices.
#[derive(Debug)]
pub struct VertexFiller {
    mask_format: MaskFormat,
    can_draw_direct: bool,
    creation_matrix: Affine,
    creation_bounds: Rect,
    left_top: Box<[Point]>,
    strike_to_source_scale: f32,
}

impl VertexFiller {
    pub(crate) fn new(
        mask_format: MaskFormat,
        can_draw_direct: bool,
        creation_matrix: Affine,
        creation_bounds: Rect,
        left_top: Box<[Point]>,
        strike_to_source_scale: f32,
    ) -> Self {
        Self {
            mask_format,
            can_draw_direct,
            creation_matrix,
            creation_bounds,
            left_top,
            strike_to_source_scale,
        }
    }

    /// The atlas format of the glyph images.
    #[inline]
    pub fn mask_format(&self) -> MaskFormat {
        self.mask_format
    }

    /// Whether glyph corners are stored in device space.
    #[inline]
    pub fn can_draw_direct(&self) -> bool {
        self.can_draw_direct
    }

    /// The matrix the glyph corners are relative to.
    #[inline]
    pub fn creation_matrix(&self) -> Affine {
        self.creation_matrix
    }

    /// Union of the glyph quads, relative to the creation matrix.
    #[inline]
    pub fn creation_bounds(&self) -> Rect {
        self.creation_bounds
    }

    /// Top-left corner of each glyph quad, relative to the creation matrix.
    #[inline]
    pub fn left_top(&self) -> &[Point] {
        &self.left_top
    }

    /// Size of one strike pixel in creation space.
    #[inline]
    pub fn strike_to_source_scale(&self) -> f32 {
        self.strike_to_source_scale
    }

    /// Number of glyphs placed.
    #[inline]
    pub fn glyph_count(&self) -> usize {
        self.left_top.len()
    }

    /// The whole-pixel offset from the creation matrix to `position_matrix`,
    /// if quads can be drawn untransformed under it.
    fn direct_offset(&self, position_matrix: &Affine) -> Option<Vec2> {
        if !self.can_draw_direct {
            return None;
        }
        let delta = translation_delta(&self.creation_matrix, position_matrix)?;
        (delta.x.is_nearly_integer() && delta.y.is_nearly_integer())
            .then(|| Vec2::new(delta.x.round(), delta.y.round()))
    }

    /// Bounds of the glyphs under `position_matrix` and whether each glyph
    /// needs to be transformed (rather than just translated) to get there.
    pub fn device_rect_and_needs_transform(&self, position_matrix: &Affine) -> (bool, Rect) {
        if let Some(offset) = self.direct_offset(position_matrix) {
            return (false, self.creation_bounds + offset);
        }
        if !is_invertible(&self.creation_matrix) {
            return (true, Rect::ZERO);
        }
        let to_device = *position_matrix * self.creation_matrix.inverse();
        (true, to_device.transform_rect_bbox(self.creation_bounds))
    }

    /// Byte size of one vertex when drawing under `position_matrix`.
    pub fn vertex_stride(&self, position_matrix: &Affine) -> usize {
        match (
            self.mask_format.is_color(),
            self.direct_offset(position_matrix).is_some(),
        ) {
            (false, true) => size_of::<Mask2DVertex>(),
            (true, true) => size_of::<Argb2DVertex>(),
            (false, false) => size_of::<MaskTransformedVertex>(),
            (true, false) => size_of::<ArgbTransformedVertex>(),
        }
    }

    /// Writes one quad of four vertices for each of `count` glyphs starting
    /// at `offset`, returning the number of quads written.
    ///
    /// Stops early when `dst` has no room for another whole quad. `clip`
    /// only applies to untransformed quads; glyphs entirely outside it get
    /// a zero-area quad.
    pub fn fill_vertex_data(
        &self,
        dst: &mut [u8],
        offset: usize,
        count: usize,
        color: AlphaColor<Srgb>,
        glyphs: &[Glyph],
        position_matrix: &Affine,
        clip: Option<Rect>,
    ) -> usize {
        let end = offset
            .saturating_add(count)
            .min(glyphs.len())
            .min(self.left_top.len());
        let start = offset.min(end);
        let glyphs = glyphs[start..end].iter().zip(&self.left_top[start..end]);
        let quad_size = 4 * self.vertex_stride(position_matrix);
        let quads = dst.chunks_exact_mut(quad_size);
        let color = color.premultiply().to_rgba8().to_u32();

        let mut written = 0;
        if let Some(offset) = self.direct_offset(position_matrix) {
            let clip = clip.map(|clip| clip.expand());
            for (quad, (glyph, left_top)) in quads.zip(glyphs) {
                let (rect, uv) = direct_quad(glyph, *left_top + offset, clip);
                if self.mask_format.is_color() {
                    write_quad(quad, corners(rect, uv).map(|(p, uv)| Argb2DVertex {
                        position: p,
                        uv,
                    }));
                } else {
                    write_quad(quad, corners(rect, uv).map(|(p, uv)| Mask2DVertex {
                        position: p,
                        color,
                        uv,
                    }));
                }
                written += 1;
            }
        } else {
            let to_device = if is_invertible(&self.creation_matrix) {
                *position_matrix * self.creation_matrix.inverse()
            } else {
                // Nothing sensible can be drawn; collapse every quad.
                Affine::scale(0.0)
            };
            let scale = f64::from(self.strike_to_source_scale);
            for (quad, (glyph, left_top)) in quads.zip(glyphs) {
                let locator = &glyph.atlas_locator;
                let local = Rect::from_origin_size(
                    *left_top,
                    (
                        f64::from(locator.width) * scale,
                        f64::from(locator.height) * scale,
                    ),
                );
                let uv = locator.uv_rect();
                let vertices = corners(local, uv).map(|(p, uv)| {
                    let device = to_device * Point::new(f64::from(p[0]), f64::from(p[1]));
                    (to_f32(device), p, uv)
                });
                if self.mask_format.is_color() {
                    write_quad(
                        quad,
                        vertices.map(|(position, local, uv)| ArgbTransformedVertex {
                            position,
                            local,
                            uv,
                        }),
                    );
                } else {
                    write_quad(
                        quad,
                        vertices.map(|(position, local, uv)| MaskTransformedVertex {
                            position,
                            local,
                            color,
                            uv,
                        }),
                    );
                }
                written += 1;
            }
        }
        written
    }

    /// Bytes the filler occupies in an arena once deserialized.
    pub fn unflatten_size(&self) -> usize {
        self.left_top.len() * size_of::<Point>()
    }

    pub(crate) fn flatten(&self, buffer: &mut WriteBuffer) {
        buffer.write_u8(self.mask_format as u8);
        buffer.write_bool(self.can_draw_direct);
        buffer.write_affine(&self.creation_matrix);
        buffer.write_rect(self.creation_bounds);
        buffer.write_f32(self.strike_to_source_scale);
        buffer.write_points(&self.left_top);
    }

    pub(crate) fn make_from_buffer(
        buffer: &mut ReadBuffer<'_>,
        alloc: &SubRunAllocator,
    ) -> Result<Self, DecodeError> {
        let mask_format = MaskFormat::from_u8(buffer.read_u8()?)
            .ok_or_else(|| DecodeError::new(DecodeErrorKind::UnknownMaskFormat, buffer.offset() - 1))?;
        let can_draw_direct = buffer.read_bool()?;
        let creation_matrix = buffer.read_affine()?;
        let creation_bounds = buffer.read_rect()?;
        let scale_offset = buffer.offset();
        let strike_to_source_scale = buffer.read_f32()?;
        if strike_to_source_scale <= 0.0 {
            return Err(DecodeError::new(DecodeErrorKind::InvalidSubRun, scale_offset));
        }
        let points_offset = buffer.offset();
        let left_top = make_points_from_buffer(buffer, alloc);
        if left_top.is_empty() {
            return Err(DecodeError::new(
                DecodeErrorKind::InvalidPositions,
                points_offset,
            ));
        }
        Ok(Self::new(
            mask_format,
            can_draw_direct,
            creation_matrix,
            creation_bounds,
            left_top,
            strike_to_source_scale,
        ))
    }
}

/// The device rect and texel rect of an untransformed glyph quad, clipped.
fn direct_quad(glyph: &Glyph, left_top: Point, clip: Option<Rect>) -> (Rect, [u16; 4]) {
    let locator = &glyph.atlas_locator;
    let rect = Rect::from_origin_size(
        left_top,
        (f64::from(locator.width), f64::from(locator.height)),
    );
    let uv = locator.uv_rect();
    let Some(clip) = clip else {
        return (rect, uv);
    };
    let clipped = rect.intersect(clip);
    // Device pixels map 1:1 onto texels, so the texel rect shrinks by the
    // same amounts.
    let uv = [
        offset_texel(uv[0], clipped.x0 - rect.x0),
        offset_texel(uv[1], clipped.y0 - rect.y0),
        offset_texel(uv[2], clipped.x1 - rect.x1),
        offset_texel(uv[3], clipped.y1 - rect.y1),
    ];
    (clipped, uv)
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "clip offsets are whole pixels within a glyph no larger than u16::MAX"
)]
fn offset_texel(texel: u16, delta: f64) -> u16 {
    let delta = delta.round() as i32;
    u16::try_from(i32::from(texel) + delta).unwrap_or(texel)
}

/// Quad corners in strip order: left-top, left-bottom, right-top,
/// right-bottom.
fn corners(rect: Rect, uv: [u16; 4]) -> [([f32; 2], [u16; 2]); 4] {
    let [l, t, r, b] = [rect.x0, rect.y0, rect.x1, rect.y1];
    let [ul, vt, ur, vb] = uv;
    [
        (to_f32(Point::new(l, t)), [ul, vt]),
        (to_f32(Point::new(l, b)), [ul, vb]),
        (to_f32(Point::new(r, t)), [ur, vt]),
        (to_f32(Point::new(r, b)), [ur, vb]),
    ]
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "vertex positions are stored at f32 precision"
)]
#[inline]
fn to_f32(point: Point) -> [f32; 2] {
    [point.x as f32, point.y as f32]
}

fn write_quad<V: Pod>(quad: &mut [u8], vertices: [V; 4]) {
    quad.copy_from_slice(bytemuck::cast_slice::<V, u8>(&vertices));
}
