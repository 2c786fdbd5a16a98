// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Glyph Sub-Runs manages the atlas-backed pieces a text draw is split into.
//!
//! When shaped text is prepared for drawing on a GPU surface, its glyphs are
//! partitioned into *sub-runs*: maximal runs of glyphs sharing one rendering
//! strategy. This crate:
//!
//! - builds those sub-runs from a [`GlyphRunList`] and keeps them, in drawing
//!   order, in a [`SubRunContainer`] tied to the transform they were built for;
//! - decides whether an existing container can be redrawn with a new paint and
//!   transform ([`SubRunContainer::can_reuse`]);
//! - serializes containers to a compact binary stream and reconstructs them
//!   later, possibly in another process ([`SubRunContainer::flatten_runs`],
//!   [`SubRunContainer::make_from_buffer_in_alloc`]);
//! - generates per-glyph vertex data and drives atlas residency refresh
//!   through caller-supplied delegates ([`AtlasSubRun`]).
//!
//! Three strategies exist: direct device-space masks ([`DirectMaskSubRun`]),
//! transformed masks ([`TransformedMaskSubRun`]) and scaled distance fields
//! ([`SdftSubRun`]).
//!
//! Glyph rasterization, atlas packing and texture upload are the caller's
//! business; they are reached through [`StrikeForGpuCache`],
//! [`RegenerateAtlasDelegate`] and [`AtlasDrawDelegate`].
//!
//! ## Features
//!
//! - `std` (enabled by default): Get floating point functions from the standard library
//!   (likely using your target's libc).
//! - `libm`: Use floating point implementations from [libm].
//!
//! At least one of `std` and `libm` is required; `std` overrides `libm`.
//!
//! [libm]: https://crates.io/crates/libm

// LINEBENDER LINT SET - lib.rs - v3
// See https://linebender.org/wiki/canonical-lints/
// These lints shouldn't apply to examples or tests.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
// These lints shouldn't apply to examples.
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub use peniko::{color, kurbo};

mod allocator;
mod buffer;
mod container;
mod device;
mod error;
mod glyph;
mod glyph_run;
mod glyph_vector;
mod math;
mod paint;
mod strike;
mod sub_run;
mod sub_run_list;
mod vertex_filler;

pub use allocator::{ArenaBox, SubRunAllocator};
pub use buffer::{ReadBuffer, WriteBuffer};
pub use container::{
    make_points_from_buffer, SubRunContainer, SubRunContainerOwner, SubRunCreationBehavior,
};
pub use device::{
    SdftControl, SdftMatrixRange, StrikeDeviceInfo, DISTANCE_FIELD_LARGE_SIZE,
    DISTANCE_FIELD_MEDIUM_SIZE, DISTANCE_FIELD_SMALL_SIZE,
};
pub use error::{DecodeError, DecodeErrorKind};
pub use glyph::{
    AtlasLocator, Glyph, GlyphId, GlyphMetrics, MaskFormat, PackedGlyphId, SUBPIXEL_BUCKETS,
};
pub use glyph_run::{FontInstance, GlyphRun, GlyphRunBuilder, GlyphRunList, PositionedGlyph};
pub use glyph_vector::GlyphVector;
pub use paint::{Edging, RunPaint};
pub use strike::{StrikeCache, StrikeClient, StrikeDescriptor, StrikeForGpuCache, TextStrike};
pub use sub_run::{
    AtlasDrawDelegate, AtlasRunCore, AtlasSubRun, DirectMaskSubRun, GlyphParams, PreparePass,
    RegenerateAtlasDelegate, RendererData, SdftSubRun, SubRun, SubRunOwner, SubRunStorage,
    SubRunStreamTag, SubRunVariant, TransformedMaskSubRun, DIRECT_MASK_PADDING,
    DISTANCE_FIELD_PADDING, MAX_GLYPH_SIZE, MAX_TRANSFORMED_STRIKE_SIZE,
    TRANSFORMED_MASK_PADDING,
};
pub use sub_run_list::{SubRunIter, SubRunList};
pub use vertex_filler::{
    Argb2DVertex, ArgbTransformedVertex, Mask2DVertex, MaskTransformedVertex, VertexFiller,
};
