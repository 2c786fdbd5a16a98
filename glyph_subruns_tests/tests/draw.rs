// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drawing containers through a delegate.

use std::rc::Rc;

use glyph_subruns::{
    AtlasSubRun, GlyphRunList, MaskFormat, RendererData, RunPaint, StrikeDeviceInfo,
    SubRunAllocator, SubRunStorage,
};
use peniko::kurbo::{Affine, Point};

use crate::util::{build, glyph_run, run_list, DrawRecorder, EMOJI};

#[test]
fn draw_visits_sub_runs_in_order() {
    let alloc = SubRunAllocator::new();
    let list = GlyphRunList::new(Point::ZERO)
        .with_run(glyph_run(16.0, &[1, EMOJI, 2]))
        .with_run(glyph_run(48.0, &[3]));
    let container = build(
        &alloc,
        &list,
        Affine::IDENTITY,
        &RunPaint::default(),
        &StrikeDeviceInfo::default(),
    );

    let mut recorder = DrawRecorder::default();
    let origin = Point::new(4.0, 5.0);
    container.draw(
        origin,
        &RunPaint::default(),
        &SubRunStorage::none(),
        &mut recorder,
    );

    let ids: Vec<Vec<u32>> = recorder
        .draws
        .iter()
        .map(|draw| draw.glyph_ids.clone())
        .collect();
    assert_eq!(ids, [vec![1], vec![EMOJI], vec![2], vec![3]]);
    assert!(recorder.draws.iter().all(|draw| draw.origin == origin));
    assert_eq!(
        recorder.draws[1].renderer_data,
        RendererData {
            is_sdf: false,
            is_lcd: false,
            mask_format: MaskFormat::Argb,
        }
    );
    assert!(recorder.draws[3].renderer_data.is_sdf);
}

#[test]
fn draw_hands_out_storage_tokens() {
    let alloc = SubRunAllocator::new();
    let container = build(
        &alloc,
        &run_list(16.0, &[1, EMOJI]),
        Affine::IDENTITY,
        &RunPaint::default(),
        &StrikeDeviceInfo::masks_only(),
    );

    let owner: Rc<dyn std::any::Any> = Rc::new(17_u32);
    let mut recorder = DrawRecorder::default();
    container.draw(
        Point::ZERO,
        &RunPaint::default(),
        &SubRunStorage::new(owner.clone()),
        &mut recorder,
    );
    assert!(recorder.draws.iter().all(|draw| draw.has_storage));
    // One token per drawn sub-run, plus ours.
    assert_eq!(Rc::strong_count(&owner), 3);

    recorder.storage.clear();
    assert_eq!(Rc::strong_count(&owner), 1);
}

#[test]
fn draw_accepts_closures() {
    let alloc = SubRunAllocator::new();
    let container = build(
        &alloc,
        &run_list(16.0, &[1, 2]),
        Affine::IDENTITY,
        &RunPaint::default(),
        &StrikeDeviceInfo::masks_only(),
    );

    let mut glyphs = 0;
    let mut count = |sub_run: &dyn AtlasSubRun,
                     _: Point,
                     _: &RunPaint,
                     _: SubRunStorage,
                     _: RendererData| {
        glyphs += sub_run.glyph_count();
    };
    container.draw(
        Point::ZERO,
        &RunPaint::default(),
        &SubRunStorage::none(),
        &mut count,
    );
    assert_eq!(glyphs, 2);
}

#[test]
fn draw_empty_container_calls_nothing() {
    let alloc = SubRunAllocator::new();
    let container = build(
        &alloc,
        &GlyphRunList::default(),
        Affine::IDENTITY,
        &RunPaint::default(),
        &StrikeDeviceInfo::default(),
    );
    let mut recorder = DrawRecorder::default();
    container.draw(
        Point::ZERO,
        &RunPaint::default(),
        &SubRunStorage::none(),
        &mut recorder,
    );
    assert!(recorder.draws.is_empty());
}
