// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Building sub-runs from glyph runs, and deciding when they can be reused.

use glyph_subruns::{
    AtlasSubRun, Edging, GlyphRunList, MaskFormat, RunPaint, StrikeDeviceInfo, SubRun,
    SubRunAllocator, SubRunContainer, SubRunCreationBehavior, SubRunStreamTag, SubRunVariant,
};
use peniko::kurbo::{Affine, Point, Rect};

use crate::util::{build, glyph_ids, glyph_run, run_list, FakeStrikes, EMOJI, SPACE};

fn tags(container: &SubRunContainer<'_>) -> Vec<SubRunStreamTag> {
    container
        .sub_runs()
        .iter()
        .map(SubRun::sub_run_stream_tag)
        .collect()
}

#[test]
fn container_direct_run_end_to_end() {
    let alloc = SubRunAllocator::new();
    let paint = RunPaint::default();
    let container = build(
        &alloc,
        &run_list(16.0, &[1, 2, 3]),
        Affine::IDENTITY,
        &paint,
        &StrikeDeviceInfo::masks_only(),
    );

    assert_eq!(container.sub_runs().len(), 1);
    assert_eq!(container.initial_position(), Affine::IDENTITY);
    let sub_run = container.sub_runs().front().unwrap();
    assert!(matches!(sub_run, SubRunVariant::DirectMask(_)));

    let atlas = sub_run.as_atlas();
    assert_eq!(atlas.glyph_count(), 3);
    assert_eq!(atlas.mask_format(), MaskFormat::A8);
    assert_eq!(glyph_ids(atlas), [1, 2, 3]);
    assert_eq!(
        atlas.vertex_filler().left_top(),
        [
            Point::new(0.0, 8.0),
            Point::new(10.0, 8.0),
            Point::new(20.0, 8.0)
        ]
    );
    assert_eq!(
        atlas.vertex_filler().creation_bounds(),
        Rect::new(0.0, 8.0, 28.0, 20.0)
    );
    assert!(!atlas.renderer_data().is_sdf);
    assert!(!atlas.device_rect_and_needs_transform(&Affine::IDENTITY).0);

    assert!(container.can_reuse(&paint, &Affine::IDENTITY));
    assert!(container.can_reuse(&paint, &Affine::translate((5.0, -3.0))));
    assert!(!container.can_reuse(&paint, &Affine::translate((0.5, 0.0))));
    assert!(!container.can_reuse(&paint, &Affine::scale(2.0)));
    assert!(!container.can_reuse(&paint.with_edging(Edging::Alias), &Affine::IDENTITY));
}

#[test]
fn container_splits_on_mask_format_change() {
    let alloc = SubRunAllocator::new();
    let container = build(
        &alloc,
        &run_list(16.0, &[1, EMOJI, 2, SPACE, 3]),
        Affine::IDENTITY,
        &RunPaint::default(),
        &StrikeDeviceInfo::masks_only(),
    );

    let runs: Vec<(Vec<u32>, MaskFormat)> = container
        .sub_runs()
        .iter()
        .map(|sub_run| {
            let atlas = sub_run.as_atlas();
            (glyph_ids(atlas), atlas.mask_format())
        })
        .collect();
    assert_eq!(
        runs,
        [
            (vec![1], MaskFormat::A8),
            (vec![EMOJI], MaskFormat::Argb),
            (vec![2, 3], MaskFormat::A8),
        ]
    );
}

#[test]
fn container_color_runs_ignore_edging() {
    let alloc = SubRunAllocator::new();
    let paint = RunPaint::default();
    let container = build(
        &alloc,
        &run_list(16.0, &[EMOJI]),
        Affine::IDENTITY,
        &paint,
        &StrikeDeviceInfo::masks_only(),
    );
    assert!(container.can_reuse(&paint.with_edging(Edging::Alias), &Affine::IDENTITY));
}

#[test]
fn container_glyph_runs_never_share_sub_runs() {
    let alloc = SubRunAllocator::new();
    let list = GlyphRunList::new(Point::ZERO)
        .with_run(glyph_run(16.0, &[1, 2]))
        .with_run(glyph_run(16.0, &[3]));
    let container = build(
        &alloc,
        &list,
        Affine::IDENTITY,
        &RunPaint::default(),
        &StrikeDeviceInfo::masks_only(),
    );
    let ids: Vec<Vec<u32>> = container
        .sub_runs()
        .iter()
        .map(|sub_run| glyph_ids(sub_run.as_atlas()))
        .collect();
    assert_eq!(ids, [vec![1, 2], vec![3]]);
}

#[test]
fn container_empty_glyphs_produce_no_sub_runs() {
    let alloc = SubRunAllocator::new();
    let container = build(
        &alloc,
        &run_list(16.0, &[SPACE, SPACE]),
        Affine::IDENTITY,
        &RunPaint::default(),
        &StrikeDeviceInfo::masks_only(),
    );
    assert!(container.is_empty());
}

#[test]
fn container_subpixel_positions_pick_buckets() {
    let alloc = SubRunAllocator::new();
    let paint = RunPaint::default();
    let container = build(
        &alloc,
        &run_list(16.0, &[1]),
        Affine::translate((0.3, 0.0)),
        &paint,
        &StrikeDeviceInfo::masks_only(),
    );
    let atlas = container.sub_runs().front().unwrap().as_atlas();
    assert_eq!(atlas.glyphs()[0].packed_id.subpixel_x(), 1);
    assert_eq!(atlas.vertex_filler().left_top(), [Point::new(0.0, 8.0)]);

    assert!(container.can_reuse(&paint, &Affine::translate((1.3, 2.0))));
    assert!(!container.can_reuse(&paint, &Affine::translate((0.0, 0.0))));
}

#[test]
fn container_lcd_paint_uses_lcd_masks() {
    let alloc = SubRunAllocator::new();
    let paint = RunPaint::default().with_edging(Edging::SubpixelAntiAlias);
    let list = run_list(16.0, &[1]);
    let container = build(
        &alloc,
        &list,
        Affine::IDENTITY,
        &paint,
        &StrikeDeviceInfo::masks_only(),
    );
    let atlas = container.sub_runs().front().unwrap().as_atlas();
    assert_eq!(atlas.mask_format(), MaskFormat::A565);
    assert!(atlas.renderer_data().is_lcd);

    let no_lcd = StrikeDeviceInfo {
        lcd_allowed: false,
        ..StrikeDeviceInfo::masks_only()
    };
    let container = build(&alloc, &list, Affine::IDENTITY, &paint, &no_lcd);
    let atlas = container.sub_runs().front().unwrap().as_atlas();
    assert_eq!(atlas.mask_format(), MaskFormat::A8);
    assert!(!atlas.renderer_data().is_lcd);
}

#[test]
fn container_large_glyphs_use_transformed_masks() {
    let alloc = SubRunAllocator::new();
    let paint = RunPaint::default();
    let container = build(
        &alloc,
        &run_list(400.0, &[1]),
        Affine::IDENTITY,
        &paint,
        &StrikeDeviceInfo::masks_only(),
    );
    assert_eq!(tags(&container), [SubRunStreamTag::TransformedMask]);

    let atlas = container.sub_runs().front().unwrap().as_atlas();
    let filler = atlas.vertex_filler();
    assert_eq!(filler.strike_to_source_scale(), 3.125);
    assert_eq!(filler.left_top(), [Point::new(0.0, -280.0)]);
    assert_eq!(atlas.glyph_src_padding(), 1);
    assert!(atlas.device_rect_and_needs_transform(&Affine::IDENTITY).0);

    assert!(container.can_reuse(&paint, &Affine::scale(2.0)));
    assert!(container.can_reuse(&paint, &Affine::rotate(0.5)));
    assert!(!container.can_reuse(&paint, &Affine::scale(0.0)));
}

#[test]
fn container_mid_size_text_uses_distance_fields() {
    let alloc = SubRunAllocator::new();
    let paint = RunPaint::default();
    let container = build(
        &alloc,
        &run_list(48.0, &[1, EMOJI]),
        Affine::IDENTITY,
        &paint,
        &StrikeDeviceInfo::default(),
    );
    assert_eq!(
        tags(&container),
        [SubRunStreamTag::Sdft, SubRunStreamTag::DirectMask]
    );

    let mut sub_runs = container.sub_runs().iter();
    let SubRunVariant::Sdft(sdft) = sub_runs.next().unwrap() else {
        panic!("expected a distance field sub-run");
    };
    let range = sdft.matrix_range();
    assert_eq!(range.max_scale, 1.5);
    assert!((range.min_scale - 32.0 / 48.0).abs() < 1e-6);
    assert!(sdft.renderer_data().is_sdf);
    assert_eq!(sdft.mask_format(), MaskFormat::A8);
    assert_eq!(sdft.glyph_src_padding(), 4);
    assert!(sdft.can_reuse(&paint, &Affine::scale(1.2)));
    assert!(!sdft.can_reuse(&paint, &Affine::scale(2.0)));
    assert!(!sdft.can_reuse(&paint.with_edging(Edging::Alias), &Affine::IDENTITY));

    let color = sub_runs.next().unwrap().as_atlas();
    assert_eq!(glyph_ids(color), [EMOJI]);
    assert_eq!(color.mask_format(), MaskFormat::Argb);
}

#[test]
fn container_smallest_distance_field_size_is_reusable() {
    let alloc = SubRunAllocator::new();
    let paint = RunPaint::default();
    for (size, matrix) in [(18.0, Affine::IDENTITY), (9.0, Affine::scale(2.0))] {
        let container = build(
            &alloc,
            &run_list(size, &[1, 2, 3]),
            matrix,
            &paint,
            &StrikeDeviceInfo::default(),
        );
        assert_eq!(tags(&container), [SubRunStreamTag::Sdft]);
        assert!(container.can_reuse(&paint, &matrix));
    }
}

#[test]
fn container_small_text_skips_distance_fields() {
    let alloc = SubRunAllocator::new();
    let container = build(
        &alloc,
        &run_list(12.0, &[1]),
        Affine::IDENTITY,
        &RunPaint::default(),
        &StrikeDeviceInfo::default(),
    );
    assert_eq!(tags(&container), [SubRunStreamTag::DirectMask]);
}

#[test]
fn container_strike_calculations_only_stays_empty() {
    let alloc = SubRunAllocator::new();
    let mut strikes = FakeStrikes::default();
    let container = SubRunContainer::make_in_alloc(
        &run_list(16.0, &[1, 2, 3]),
        &Affine::IDENTITY,
        &RunPaint::default(),
        &StrikeDeviceInfo::masks_only(),
        &mut strikes,
        &alloc,
        SubRunCreationBehavior::StrikeCalculationsOnly,
        "calc",
    );
    assert!(container.is_empty());
    assert_eq!(strikes.lookups.len(), 3);
    assert_eq!(alloc.live_objects(), 1);
}

#[test]
fn container_estimate_matches_allocation() {
    let list = GlyphRunList::new(Point::ZERO)
        .with_run(glyph_run(16.0, &[1, EMOJI, 2]))
        .with_run(glyph_run(48.0, &[3, 4]))
        .with_run(glyph_run(400.0, &[5]));
    let paint = RunPaint::default();
    let device_info = StrikeDeviceInfo::default();

    let mut strikes = FakeStrikes::default();
    let estimate = SubRunContainer::estimate_alloc_size(
        &list,
        &Affine::IDENTITY,
        &paint,
        &device_info,
        &mut strikes,
    );
    assert!(!strikes.lookups.is_empty());

    let alloc = SubRunAllocator::with_capacity(estimate);
    let container = build(&alloc, &list, Affine::IDENTITY, &paint, &device_info);
    assert_eq!(container.sub_runs().len(), 5);
    assert_eq!(estimate, alloc.bytes_allocated());
    assert!(alloc.bytes_allocated() <= alloc.reserved());

    // Estimating primes the strike cache exactly like a strike-only build.
    let mut calc_only = FakeStrikes::default();
    let calc_alloc = SubRunAllocator::new();
    let empty = SubRunContainer::make_in_alloc(
        &list,
        &Affine::IDENTITY,
        &paint,
        &device_info,
        &mut calc_only,
        &calc_alloc,
        SubRunCreationBehavior::StrikeCalculationsOnly,
        "calc",
    );
    assert!(empty.is_empty());
    assert_eq!(calc_only.lookups, strikes.lookups);
}

#[test]
fn container_drop_releases_sub_runs() {
    let alloc = SubRunAllocator::new();
    {
        let container = build(
            &alloc,
            &run_list(16.0, &[1, EMOJI, 2]),
            Affine::IDENTITY,
            &RunPaint::default(),
            &StrikeDeviceInfo::masks_only(),
        );
        assert_eq!(container.sub_runs().len(), 3);
        assert_eq!(alloc.live_objects(), 4);
    }
    assert_eq!(alloc.live_objects(), 0);
}
