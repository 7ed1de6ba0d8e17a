// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

// Enable all clippy lints except for many of the pedantic ones. It's a shame this needs to be copied and pasted across crates, but there doesn't appear to be a way to include inner attributes from a common source.
#![deny(
    clippy::all,
    clippy::default_trait_access,
    clippy::expl_impl_clone_on_copy,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::unseparated_literal_suffix,
    clippy::used_underscore_binding
)]
// It is often more clear to show that nothing is being moved.
#![allow(clippy::match_ref_pats)]
// Subjective style.
#![allow(
    clippy::len_without_is_empty,
    clippy::redundant_field_names,
    clippy::too_many_arguments
)]
// Default isn't as big a deal as people seem to think it is.
#![allow(clippy::new_without_default, clippy::new_ret_no_self)]
// Arc<Mutex> can be more clear than needing to grok Orderings:
#![allow(clippy::mutex_atomic)]

use std::fmt;

use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};

pub mod codec;

use codec::{Cursor, PackError};

///
/// The advisory type tag carried by every Blob. The tag never changes the
/// identity of the payload (identity and equality are byte-wise); it drives
/// the order-preserving encoding applied before the payload reaches a
/// storage backend.
///
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum DataType {
    Byte = 0,
    Pointer = 1,
    Tracked = 2,
    Int32 = 3,
    Int64 = 4,
    UInt32 = 5,
    UInt64 = 6,
    Float = 7,
    Double = 8,
}

impl DataType {
    /// True for the types whose objects feed predicate-named histograms.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            DataType::Int32
                | DataType::Int64
                | DataType::UInt32
                | DataType::UInt64
                | DataType::Float
                | DataType::Double
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DataType::Byte => "byte",
            DataType::Pointer => "pointer",
            DataType::Tracked => "tracked",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::UInt32 => "uint32",
            DataType::UInt64 => "uint64",
            DataType::Float => "float",
            DataType::Double => "double",
        };
        write!(f, "{name}")
    }
}

///
/// A byte payload tagged with a DataType.
///
/// The original owner/reference split collapses here: `Bytes` hands out
/// refcounted views, so a Blob built from a caller's buffer and a Blob that
/// owns its allocation behave identically and release exactly once. Clones
/// are O(1) and never copy the payload.
///
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Blob {
    data: Bytes,
    data_type: DataType,
}

impl Blob {
    /// Take ownership of a buffer.
    pub fn owned<B: Into<Vec<u8>>>(data: B, data_type: DataType) -> Blob {
        Blob {
            data: Bytes::from(data.into()),
            data_type,
        }
    }

    /// Borrow from a longer-lived buffer without copying.
    pub fn reference(data: Bytes, data_type: DataType) -> Blob {
        Blob { data, data_type }
    }

    pub fn empty(data_type: DataType) -> Blob {
        Blob {
            data: Bytes::new(),
            data_type,
        }
    }

    pub fn from_i32(value: i32) -> Blob {
        Blob::owned(value.to_le_bytes().to_vec(), DataType::Int32)
    }

    pub fn from_i64(value: i64) -> Blob {
        Blob::owned(value.to_le_bytes().to_vec(), DataType::Int64)
    }

    pub fn from_u32(value: u32) -> Blob {
        Blob::owned(value.to_le_bytes().to_vec(), DataType::UInt32)
    }

    pub fn from_u64(value: u64) -> Blob {
        Blob::owned(value.to_le_bytes().to_vec(), DataType::UInt64)
    }

    pub fn from_f32(value: f32) -> Blob {
        Blob::owned(value.to_le_bytes().to_vec(), DataType::Float)
    }

    pub fn from_f64(value: f64) -> Blob {
        Blob::owned(value.to_le_bytes().to_vec(), DataType::Double)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Reinterpret the payload as a numeric value. Numeric payloads are the
    /// value's little-endian bytes, as produced by the `from_*` constructors.
    pub fn as_i32(&self) -> Option<i32> {
        self.data[..].try_into().ok().map(i32::from_le_bytes)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.data[..].try_into().ok().map(i64::from_le_bytes)
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.data[..].try_into().ok().map(u32::from_le_bytes)
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.data[..].try_into().ok().map(u64::from_le_bytes)
    }

    pub fn as_f32(&self) -> Option<f32> {
        self.data[..].try_into().ok().map(f32::from_le_bytes)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.data[..].try_into().ok().map(f64::from_le_bytes)
    }

    /// The numeric value of the payload as an f64, if the tag is numeric.
    pub fn numeric_value(&self) -> Option<f64> {
        match self.data_type {
            DataType::Int32 => self.as_i32().map(|v| v as f64),
            DataType::Int64 => self.as_i64().map(|v| v as f64),
            DataType::UInt32 => self.as_u32().map(|v| v as f64),
            DataType::UInt64 => self.as_u64().map(|v| v as f64),
            DataType::Float => self.as_f32().map(|v| v as f64),
            DataType::Double => self.as_f64(),
            _ => None,
        }
    }

    /// Wire size of `pack`: a fixed-width length followed by the payload.
    pub fn pack_size(&self) -> usize {
        codec::LEN_WIDTH + self.data.len()
    }

    /// Write `[len big-endian][bytes]`. The type tag is not part of the
    /// payload encoding; layouts that need it write it separately.
    pub fn pack(&self, buf: &mut Vec<u8>) {
        codec::put_u64(buf, self.data.len() as u64);
        buf.extend_from_slice(&self.data);
    }

    /// Read a length-prefixed payload back out of a cursor. The returned
    /// Blob shares the cursor's backing buffer; no copy is made.
    pub fn unpack(cursor: &mut Cursor, data_type: DataType) -> Result<Blob, PackError> {
        let len = cursor.get_u64()? as usize;
        let data = cursor.get_bytes(len)?;
        Ok(Blob { data, data_type })
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Blob({} bytes, {})", self.data.len(), self.data_type)
    }
}

#[cfg(test)]
mod tests;
