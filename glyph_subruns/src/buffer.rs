// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binary stream writer and reader used to flatten sub-runs.
//!
//! Fixed-width numbers are little-endian. Counts, sizes and glyph ids are
//! unsigned LEB128 varints. Every read is bounds checked and reports the
//! offset at which it failed.

use alloc::vec::Vec;

use crate::error::{DecodeError, DecodeErrorKind};
use crate::kurbo::{Affine, Point, Rect};

/// Growable byte sink for flattened sub-runs.
#[derive(Clone, Default, Debug)]
pub struct WriteBuffer {
    bytes: Vec<u8>,
}

impl WriteBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer that can hold `capacity` bytes without growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// The bytes written so far.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the buffer, returning the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been written.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Writes a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    /// Writes a boolean as `0` or `1`.
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    /// Writes an unsigned LEB128 varint.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "each byte is masked to seven bits"
    )]
    pub fn write_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.bytes.push(byte);
                return;
            }
            self.bytes.push(byte | 0x80);
        }
    }

    /// Writes a `usize` as a varint.
    pub fn write_usize(&mut self, value: usize) {
        self.write_varint(value as u64);
    }

    /// Writes a little-endian `u64`.
    pub fn write_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian `f32`.
    pub fn write_f32(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian `f64`.
    pub fn write_f64(&mut self, value: f64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a point as two `f32`s.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "glyph positions are stored at f32 precision"
    )]
    pub fn write_point(&mut self, point: Point) {
        self.write_f32(point.x as f32);
        self.write_f32(point.y as f32);
    }

    /// Writes a rect as four `f64`s.
    pub fn write_rect(&mut self, rect: Rect) {
        self.write_f64(rect.x0);
        self.write_f64(rect.y0);
        self.write_f64(rect.x1);
        self.write_f64(rect.y1);
    }

    /// Writes the six coefficients of an affine transform as `f64`s.
    pub fn write_affine(&mut self, transform: &Affine) {
        for coeff in transform.as_coeffs() {
            self.write_f64(coeff);
        }
    }

    /// Writes a varint count followed by each point.
    pub fn write_points(&mut self, points: &[Point]) {
        self.write_usize(points.len());
        for point in points {
            self.write_point(*point);
        }
    }
}

/// Bounds-checked cursor over a flattened sub-run stream.
#[derive(Clone, Debug)]
pub struct ReadBuffer<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ReadBuffer<'a> {
    /// Creates a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current byte offset into the stream.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of unread bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Whether every byte has been consumed.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn error(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError::new(kind, self.offset)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let Some(bytes) = self.data.get(self.offset..self.offset + N) else {
            return Err(self.error(DecodeErrorKind::UnexpectedEnd));
        };
        let mut out = [0; N];
        out.copy_from_slice(bytes);
        self.offset += N;
        Ok(out)
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let [byte] = self.take::<1>()?;
        Ok(byte)
    }

    /// Reads a boolean; any byte other than `0` or `1` is an error.
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(DecodeError::new(DecodeErrorKind::InvalidBool, self.offset - 1)),
        }
    }

    /// Reads an unsigned LEB128 varint.
    pub fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let start = self.offset;
        let mut value = 0_u64;
        for shift in (0_u32..64).step_by(7) {
            let byte = self.read_u8()?;
            let bits = u64::from(byte & 0x7f);
            // The tenth byte may only contribute the top bit.
            if shift == 63 && bits > 1 {
                return Err(DecodeError::new(DecodeErrorKind::MalformedVarint, start));
            }
            value |= bits << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(DecodeError::new(DecodeErrorKind::MalformedVarint, start))
    }

    /// Reads a varint that must fit in `usize`.
    pub fn read_usize(&mut self) -> Result<usize, DecodeError> {
        let start = self.offset;
        let value = self.read_varint()?;
        usize::try_from(value).map_err(|_| DecodeError::new(DecodeErrorKind::MalformedVarint, start))
    }

    /// Reads a varint element count, rejecting counts that cannot fit in the
    /// remaining bytes when each element takes at least `min_element_size`.
    pub fn read_count(&mut self, min_element_size: usize) -> Result<usize, DecodeError> {
        let start = self.offset;
        let count = self.read_usize()?;
        let needed = count.checked_mul(min_element_size.max(1));
        match needed {
            Some(needed) if needed <= self.remaining() => Ok(count),
            _ => Err(DecodeError::new(DecodeErrorKind::CountTooLarge, start)),
        }
    }

    /// Reads a little-endian `u64`.
    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.take::<8>()?))
    }

    /// Reads a finite little-endian `f32`.
    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        let value = f32::from_le_bytes(self.take::<4>()?);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(DecodeError::new(DecodeErrorKind::NonFinite, self.offset - 4))
        }
    }

    /// Reads a finite little-endian `f64`.
    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        let value = f64::from_le_bytes(self.take::<8>()?);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(DecodeError::new(DecodeErrorKind::NonFinite, self.offset - 8))
        }
    }

    /// Reads a point stored as two `f32`s.
    pub fn read_point(&mut self) -> Result<Point, DecodeError> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        Ok(Point::new(f64::from(x), f64::from(y)))
    }

    /// Reads a rect stored as four `f64`s.
    pub fn read_rect(&mut self) -> Result<Rect, DecodeError> {
        let x0 = self.read_f64()?;
        let y0 = self.read_f64()?;
        let x1 = self.read_f64()?;
        let y1 = self.read_f64()?;
        Ok(Rect::new(x0, y0, x1, y1))
    }

    /// Reads an affine transform stored as six `f64`s.
    pub fn read_affine(&mut self) -> Result<Affine, DecodeError> {
        let mut coeffs = [0.0; 6];
        for coeff in &mut coeffs {
            *coeff = self.read_f64()?;
        }
        Ok(Affine::new(coeffs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_boundaries() {
        for value in [0, 1, 127, 128, 300, u64::from(u32::MAX), u64::MAX] {
            let mut w = WriteBuffer::new();
            w.write_varint(value);
            let mut r = ReadBuffer::new(w.as_bytes());
            assert_eq!(r.read_varint(), Ok(value));
            assert!(r.is_exhausted(), "trailing bytes after {value}");
        }
    }

    #[test]
    fn varint_encoded_lengths() {
        let mut w = WriteBuffer::new();
        w.write_varint(127);
        assert_eq!(w.len(), 1);
        w.write_varint(128);
        assert_eq!(w.len(), 3);
        // The longest encoding of a `u64` takes ten bytes.
        w.write_varint(u64::MAX);
        assert_eq!(w.len(), 13);
    }

    #[test]
    fn overlong_varint_is_rejected() {
        let bytes = [0xff; 11];
        let mut r = ReadBuffer::new(&bytes);
        assert_eq!(
            r.read_varint().map_err(|e| e.kind()),
            Err(DecodeErrorKind::MalformedVarint)
        );

        // Ten bytes whose last byte overflows 64 bits.
        let mut bytes = [0xff; 10];
        bytes[9] = 0x02;
        let mut r = ReadBuffer::new(&bytes);
        assert_eq!(
            r.read_varint().map_err(|e| e.kind()),
            Err(DecodeErrorKind::MalformedVarint)
        );
    }

    #[test]
    fn truncated_reads_report_offset() {
        let mut w = WriteBuffer::new();
        w.write_u8(9);
        w.write_f32(1.5);
        let bytes = &w.as_bytes()[..3];
        let mut r = ReadBuffer::new(bytes);
        assert_eq!(r.read_u8(), Ok(9));
        let err = r.read_f32().unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::UnexpectedEnd);
        assert_eq!(err.offset(), 1);
    }

    #[test]
    fn invalid_bool() {
        let bytes = [1, 0, 2];
        let mut r = ReadBuffer::new(&bytes);
        assert_eq!(r.read_bool(), Ok(true));
        assert_eq!(r.read_bool(), Ok(false));
        let err = r.read_bool().unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::InvalidBool);
        assert_eq!(err.offset(), 2);
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        let mut w = WriteBuffer::new();
        w.write_f64(f64::NAN);
        let mut r = ReadBuffer::new(w.as_bytes());
        assert_eq!(
            r.read_f64().map_err(|e| e.kind()),
            Err(DecodeErrorKind::NonFinite)
        );
    }

    #[test]
    fn affine_and_rect_round_trip() {
        let t = Affine::new([2.0, 0.5, -0.25, 3.0, 10.125, -7.0]);
        let rect = Rect::new(-1.0, 2.0, 30.5, 40.0);
        let mut w = WriteBuffer::new();
        w.write_affine(&t);
        w.write_rect(rect);
        let mut r = ReadBuffer::new(w.as_bytes());
        assert_eq!(r.read_affine(), Ok(t));
        assert_eq!(r.read_rect(), Ok(rect));
    }

    #[test]
    fn count_larger_than_stream_is_rejected() {
        let mut w = WriteBuffer::new();
        w.write_usize(1000);
        w.write_u8(0);
        let mut r = ReadBuffer::new(w.as_bytes());
        assert_eq!(
            r.read_count(8).map_err(|e| e.kind()),
            Err(DecodeErrorKind::CountTooLarge)
        );
    }
}
