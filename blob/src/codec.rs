// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Fixed-width big-endian integer codec shared by every wire layout.
//!
//! All lengths and counts are 8 bytes, ranks are 4 bytes, and tags are a
//! single byte. One width per build: nothing on the wire is
//! variable-length encoded.

use std::fmt;

use bytes::Bytes;

/// Width of every length and count field.
pub const LEN_WIDTH: usize = std::mem::size_of::<u64>();

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PackError {
    /// The remaining capacity of a buffer was insufficient.
    ShortBuffer { needed: usize, remaining: usize },
    /// An operation or direction tag byte was not a known value.
    BadTag(u8),
}

impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PackError::ShortBuffer { needed, remaining } => write!(
                f,
                "short buffer: needed {needed} bytes but only {remaining} remain"
            ),
            PackError::BadTag(tag) => write!(f, "unknown tag byte {tag:#04x}"),
        }
    }
}

pub fn put_u8(buf: &mut Vec<u8>, value: u8) {
    buf.push(value);
}

pub fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn put_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn put_f64(buf: &mut Vec<u8>, value: f64) {
    buf.extend_from_slice(&value.to_bits().to_be_bytes());
}

///
/// A read position over a shared byte buffer. Reads never copy: slices are
/// handed out as refcounted views of the backing Bytes.
///
pub struct Cursor {
    data: Bytes,
    pos: usize,
}

impl Cursor {
    pub fn new(data: Bytes) -> Cursor {
        Cursor { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, len: usize) -> Result<usize, PackError> {
        if self.remaining() < len {
            return Err(PackError::ShortBuffer {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += len;
        Ok(start)
    }

    pub fn get_u8(&mut self) -> Result<u8, PackError> {
        let start = self.take(1)?;
        Ok(self.data[start])
    }

    pub fn get_u32(&mut self) -> Result<u32, PackError> {
        let start = self.take(4)?;
        let mut raw = [0_u8; 4];
        raw.copy_from_slice(&self.data[start..start + 4]);
        Ok(u32::from_be_bytes(raw))
    }

    pub fn get_u64(&mut self) -> Result<u64, PackError> {
        let start = self.take(LEN_WIDTH)?;
        let mut raw = [0_u8; LEN_WIDTH];
        raw.copy_from_slice(&self.data[start..start + LEN_WIDTH]);
        Ok(u64::from_be_bytes(raw))
    }

    pub fn get_f64(&mut self) -> Result<f64, PackError> {
        Ok(f64::from_bits(self.get_u64()?))
    }

    pub fn get_bytes(&mut self, len: usize) -> Result<Bytes, PackError> {
        let start = self.take(len)?;
        Ok(self.data.slice(start..start + len))
    }
}
