// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

/// Error produced when a serialized sub-run stream cannot be decoded.
///
/// Carries a non-exhaustive [`DecodeErrorKind`] plus the byte offset into the
/// stream at which decoding stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeError {
    /// The non-exhaustive category describing this error.
    kind: DecodeErrorKind,

    /// Byte offset in the stream where the failure was detected.
    offset: usize,
}

impl DecodeError {
    pub(crate) fn new(kind: DecodeErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }

    /// The machine-readable category for this error.
    pub fn kind(&self) -> DecodeErrorKind {
        self.kind
    }

    /// The byte offset in the stream where decoding failed.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let what = match self.kind {
            DecodeErrorKind::UnexpectedEnd => "stream ended unexpectedly",
            DecodeErrorKind::MalformedVarint => "malformed varint",
            DecodeErrorKind::InvalidBool => "boolean byte was neither 0 nor 1",
            DecodeErrorKind::NonFinite => "non-finite number",
            DecodeErrorKind::UnknownStreamTag => "unknown sub-run stream tag",
            DecodeErrorKind::UnknownMaskFormat => "unknown mask format",
            DecodeErrorKind::UnknownEdging => "unknown edging",
            DecodeErrorKind::InvalidGlyphId => "invalid packed glyph id",
            DecodeErrorKind::UnknownFont => "font id not known to the strike client",
            DecodeErrorKind::InvalidPositions => "glyph positions missing or malformed",
            DecodeErrorKind::GlyphCountMismatch => "glyph count does not match positions",
            DecodeErrorKind::CountTooLarge => "element count exceeds remaining stream",
            DecodeErrorKind::SizeHintTooLarge => "allocation size hint too large",
            DecodeErrorKind::InvalidSubRun => "sub-run payload is inconsistent",
        };
        write!(f, "{} at byte {}", what, self.offset)
    }
}

impl core::error::Error for DecodeError {}

/// The non-exhaustive category of a [`DecodeError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// Fewer bytes remained than the value being read requires.
    UnexpectedEnd,

    /// A varint was longer than ten bytes or overflowed 64 bits.
    MalformedVarint,

    /// A boolean was encoded as something other than `0` or `1`.
    InvalidBool,

    /// A float, point, rect or transform contained NaN or infinity.
    NonFinite,

    /// A node started with a tag that names no sub-run variant.
    UnknownStreamTag,

    /// A mask format byte named no [`MaskFormat`](crate::MaskFormat).
    UnknownMaskFormat,

    /// An edging byte named no [`Edging`](crate::Edging).
    UnknownEdging,

    /// A packed glyph id had an out-of-range subpixel bucket or glyph index.
    InvalidGlyphId,

    /// The [`StrikeClient`](crate::StrikeClient) could not translate a font id.
    UnknownFont,

    /// The per-glyph position list was empty or malformed.
    InvalidPositions,

    /// Glyph and position counts of a sub-run disagree.
    GlyphCountMismatch,

    /// A stored element count cannot possibly fit in the remaining bytes.
    CountTooLarge,

    /// The stored allocation size hint exceeds the accepted maximum.
    SizeHintTooLarge,

    /// A sub-run payload decoded but its parts contradict each other.
    InvalidSubRun,
}
