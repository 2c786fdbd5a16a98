// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! This crate contains the integration test suite for `glyph_subruns`.
//!
//! - The `util` module holds the fake strike cache, atlas and draw delegate the
//!   tests share.
//! - We do not use the default Rust test harness, but instead use this `mod.rs` file as the
//!   entry point to run all other tests, so every topic module can reach `util`.
//! - Put the "topic" of a test at the start of its name, for example
//!   `serialize_rejects_unknown_tag` rather than `unknown_tag_is_rejected_by_serialize`.

#![allow(missing_docs, reason = "we don't need docs for testing")]
#![allow(clippy::cast_possible_truncation, reason = "not critical for testing")]

mod container;
mod draw;
mod util;
