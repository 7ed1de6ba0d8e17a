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

//! Bulk message taxonomy and its bit-exact serialization.
//!
//! Every message is one operation kind, batched for one destination rank.
//! The wire layout is fixed-width big-endian throughout:
//!
//! ```text
//! direction  : 1 byte
//! op         : 1 byte
//! src        : 4 bytes
//! dst        : 4 bytes
//! count      : 8 bytes
//! ds_offsets : count x 4 bytes
//! slots      : count x per-op layout
//! ```
//!
//! Byte payloads are length-prefixed (8-byte length). The original
//! subject/predicate addresses that threaded responses back to requests are
//! an opaque per-item `token` here; the client resolves tokens against its
//! own ledger when materializing results.

use std::fmt;

use blob::{Blob, DataType};
use histogram::Histogram;
use num_enum::{IntoPrimitive, TryFromPrimitive};

pub use blob::codec::PackError;

mod pack;
mod unpack;

/// The operation kind. `Sync` only ever appears on client result nodes;
/// bulk messages carry the other five.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Op {
    Put = 0,
    Get = 1,
    GetOp = 2,
    Delete = 3,
    Histogram = 4,
    Sync = 5,
}

/// The operation kinds that travel as bulk messages.
pub const BULK_OPS: [Op; 5] = [Op::Put, Op::Get, Op::GetOp, Op::Delete, Op::Histogram];

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Op::Put => "PUT",
            Op::Get => "GET",
            Op::GetOp => "GETOP",
            Op::Delete => "DELETE",
            Op::Histogram => "HISTOGRAM",
            Op::Sync => "SYNC",
        };
        write!(f, "{name}")
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Direction {
    Request = 0,
    Response = 1,
}

/// How a GetOp slot drives the datastore iterator.
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum GetOpKind {
    /// The one record whose key equals the seek key.
    Eq = 0,
    /// Forward from the seek position, starting with the seek key if present.
    Next = 1,
    /// Backward from the seek position.
    Prev = 2,
    /// Forward from the first key; the seek key is ignored.
    First = 3,
    /// Backward from the last key; the seek key is ignored.
    Last = 4,
}

impl GetOpKind {
    /// Eq/Next/Prev carry a seek key on the wire; First/Last do not.
    pub fn has_seek_key(self) -> bool {
        matches!(self, GetOpKind::Eq | GetOpKind::Next | GetOpKind::Prev)
    }
}

/// Per-slot outcome. `Unset` marks a batched write whose commit has not
/// resolved yet; it is rewritten before a response leaves the range server.
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Status {
    Success = 0,
    Error = 1,
    Unset = 2,
}

///
/// A fixed-capacity, append-only batch of one operation kind destined for
/// one rank. `max_count` caps the slot count; a full bulk refuses further
/// pushes and the shuffle step leaves the item queued for the next round.
///
#[derive(Clone, Debug)]
pub struct Bulk<S> {
    pub src: u32,
    pub dst: u32,
    pub max_count: usize,
    pub slots: Vec<S>,
}

/// Capacity is a local batching attribute, not a wire field: equality is
/// over the routing header and the slots.
impl<S: PartialEq> PartialEq for Bulk<S> {
    fn eq(&self, other: &Bulk<S>) -> bool {
        self.src == other.src && self.dst == other.dst && self.slots == other.slots
    }
}

impl<S> Bulk<S> {
    pub fn new(src: u32, dst: u32, max_count: usize) -> Bulk<S> {
        Bulk {
            src,
            dst,
            max_count,
            slots: Vec::with_capacity(max_count),
        }
    }

    pub fn count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.max_count
    }

    /// Fraction of the capacity in use; the client's traffic stats record
    /// this at send time.
    pub fn fill_ratio(&self) -> f64 {
        if self.max_count == 0 {
            return 0.0;
        }
        self.slots.len() as f64 / self.max_count as f64
    }

    /// Append a slot, or hand it back when the batch is at capacity.
    pub fn push(&mut self, slot: S) -> Result<(), S> {
        if self.is_full() {
            return Err(slot);
        }
        self.slots.push(slot);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PutRequestSlot {
    pub ds_offset: u32,
    pub token: u64,
    pub subject: Blob,
    pub predicate: Blob,
    pub object: Blob,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GetRequestSlot {
    pub ds_offset: u32,
    pub token: u64,
    pub subject: Blob,
    pub predicate: Blob,
    pub object_type: DataType,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GetOpRequestSlot {
    pub ds_offset: u32,
    pub token: u64,
    pub kind: GetOpKind,
    pub subject: Blob,
    pub predicate: Blob,
    pub object_type: DataType,
    pub num_recs: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeleteRequestSlot {
    pub ds_offset: u32,
    pub token: u64,
    pub subject: Blob,
    pub predicate: Blob,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HistogramRequestSlot {
    pub ds_offset: u32,
    pub token: u64,
    pub name: Blob,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PutResponseSlot {
    pub ds_offset: u32,
    pub token: u64,
    pub status: Status,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GetResponseSlot {
    pub ds_offset: u32,
    pub token: u64,
    pub status: Status,
    pub object_type: DataType,
    /// Present exactly when `status == Success`.
    pub object: Option<Blob>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GetOpRecord {
    pub subject: Blob,
    pub predicate: Blob,
    /// Present exactly when the slot status is `Success`.
    pub object: Option<Blob>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GetOpResponseSlot {
    pub ds_offset: u32,
    pub token: u64,
    /// All records within one slot share this status.
    pub status: Status,
    pub object_type: DataType,
    pub records: Vec<GetOpRecord>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeleteResponseSlot {
    pub ds_offset: u32,
    pub token: u64,
    pub status: Status,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HistogramResponseSlot {
    pub ds_offset: u32,
    pub token: u64,
    pub status: Status,
    /// Present exactly when `status == Success`.
    pub histogram: Option<Histogram>,
}

pub type PutRequest = Bulk<PutRequestSlot>;
pub type GetRequest = Bulk<GetRequestSlot>;
pub type GetOpRequest = Bulk<GetOpRequestSlot>;
pub type DeleteRequest = Bulk<DeleteRequestSlot>;
pub type HistogramRequest = Bulk<HistogramRequestSlot>;

pub type PutResponse = Bulk<PutResponseSlot>;
pub type GetResponse = Bulk<GetResponseSlot>;
pub type GetOpResponse = Bulk<GetOpResponseSlot>;
pub type DeleteResponse = Bulk<DeleteResponseSlot>;
pub type HistogramResponse = Bulk<HistogramResponseSlot>;

/// A bulk request of any operation kind, tagged for transport dispatch.
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    Put(PutRequest),
    Get(GetRequest),
    GetOp(GetOpRequest),
    Delete(DeleteRequest),
    Histogram(HistogramRequest),
}

/// A bulk response of any operation kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    Put(PutResponse),
    Get(GetResponse),
    GetOp(GetOpResponse),
    Delete(DeleteResponse),
    Histogram(HistogramResponse),
}

impl Request {
    pub fn op(&self) -> Op {
        match self {
            Request::Put(_) => Op::Put,
            Request::Get(_) => Op::Get,
            Request::GetOp(_) => Op::GetOp,
            Request::Delete(_) => Op::Delete,
            Request::Histogram(_) => Op::Histogram,
        }
    }

    pub fn src(&self) -> u32 {
        match self {
            Request::Put(b) => b.src,
            Request::Get(b) => b.src,
            Request::GetOp(b) => b.src,
            Request::Delete(b) => b.src,
            Request::Histogram(b) => b.src,
        }
    }

    pub fn dst(&self) -> u32 {
        match self {
            Request::Put(b) => b.dst,
            Request::Get(b) => b.dst,
            Request::GetOp(b) => b.dst,
            Request::Delete(b) => b.dst,
            Request::Histogram(b) => b.dst,
        }
    }

    pub fn count(&self) -> usize {
        match self {
            Request::Put(b) => b.count(),
            Request::Get(b) => b.count(),
            Request::GetOp(b) => b.count(),
            Request::Delete(b) => b.count(),
            Request::Histogram(b) => b.count(),
        }
    }
}

impl Response {
    pub fn op(&self) -> Op {
        match self {
            Response::Put(_) => Op::Put,
            Response::Get(_) => Op::Get,
            Response::GetOp(_) => Op::GetOp,
            Response::Delete(_) => Op::Delete,
            Response::Histogram(_) => Op::Histogram,
        }
    }

    /// The responding rank: the range server this response came from.
    pub fn src(&self) -> u32 {
        match self {
            Response::Put(b) => b.src,
            Response::Get(b) => b.src,
            Response::GetOp(b) => b.src,
            Response::Delete(b) => b.src,
            Response::Histogram(b) => b.src,
        }
    }

    pub fn count(&self) -> usize {
        match self {
            Response::Put(b) => b.count(),
            Response::Get(b) => b.count(),
            Response::GetOp(b) => b.count(),
            Response::Delete(b) => b.count(),
            Response::Histogram(b) => b.count(),
        }
    }
}

#[cfg(test)]
mod tests;
