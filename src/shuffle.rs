// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The shuffle step: move one queued item into either the local bulk
//! request or the per-destination remote bulk request, creating remote
//! bulks on demand at the configured capacity.

use std::collections::HashMap;
use std::time::Instant;

use blob::Blob;
use datastore::RangeServer;
use wire::{
    Bulk, DeleteRequestSlot, DeleteResponseSlot, GetOpRequestSlot, GetOpResponseSlot,
    GetRequestSlot, GetResponseSlot, HistogramRequestSlot, HistogramResponseSlot, Op,
    PutRequestSlot, PutResponseSlot, Request, Response,
};

use crate::queues::{DeleteItem, GetItem, GetOpItem, HistogramItem, PutItem, Target};
use crate::results::{ResultNode, ResultPayload};
use crate::session::Core;

/// What the caller needs to materialize a result node later: the original
/// blobs (handed back by reference on Put/Get/Delete nodes) and the
/// enqueue time.
pub struct LedgerEntry {
    pub subject: Blob,
    pub predicate: Blob,
    pub enqueued_at: Instant,
}

/// token -> entry, filled as items are placed, drained as responses are
/// materialized. Whatever remains at the end of a flush got no response.
pub type Ledger = HashMap<u64, LedgerEntry>;

///
/// The per-operation plumbing the generic flush pipeline needs: how to
/// place an item, which transport call carries its bulk, how the local
/// range server dispatches it, and how response slots become result nodes.
///
pub trait Queued: Sized {
    type RequestSlot: Clone;
    type ResponseSlot;

    const OP: Op;

    fn token(&self) -> u64;

    /// The item's destination, computed once and cached on the item.
    fn resolve_target(&mut self, core: &Core) -> Option<Target>;

    fn ledger_entry(&self) -> LedgerEntry;

    fn into_slot(self, ds_offset: u32) -> Self::RequestSlot;

    fn communicate(
        core: &Core,
        remote: HashMap<u32, Bulk<Self::RequestSlot>>,
    ) -> Vec<Bulk<Self::ResponseSlot>>;

    fn dispatch_local(
        server: &RangeServer,
        local: Bulk<Self::RequestSlot>,
    ) -> Option<Bulk<Self::ResponseSlot>>;

    fn result_nodes(
        slot: Self::ResponseSlot,
        range_server: u32,
        ledger: &mut Ledger,
    ) -> Vec<ResultNode>;
}

pub enum Shuffled<T> {
    /// The item moved into a bulk request.
    Placed,
    /// Its destination bulk is full this round; the item stays queued.
    NoSpace(T),
    /// The hash produced no usable destination; the item is dropped.
    Error,
}

pub fn shuffle<T: Queued>(
    core: &Core,
    mut item: T,
    local: &mut Bulk<T::RequestSlot>,
    remote: &mut HashMap<u32, Bulk<T::RequestSlot>>,
    ledger: &mut Ledger,
) -> Shuffled<T> {
    let target = match item.resolve_target(core) {
        Some(target) => target,
        None => {
            log::warn!(
                "Rank {}: dropping a {} item the hash could not place",
                core.rank,
                T::OP
            );
            return Shuffled::Error;
        }
    };

    let bulk = if target.rank == core.rank {
        &mut *local
    } else {
        remote
            .entry(target.rank)
            .or_insert_with(|| Bulk::new(core.rank, target.rank, core.max_ops_per_send))
    };

    if bulk.is_full() {
        return Shuffled::NoSpace(item);
    }

    log::trace!(
        "Rank {} placed a {} item on datastore {} (rank {}, offset {})",
        core.rank,
        T::OP,
        target.ds_id,
        target.rank,
        target.offset
    );
    ledger.insert(item.token(), item.ledger_entry());
    bulk.slots.push(item.into_slot(target.offset));
    Shuffled::Placed
}

/// Hash the pair, then derive (rank, offset); any id the placement cannot
/// resolve is a miss.
fn hashed_target(core: &Core, subject: &Blob, predicate: &Blob) -> Option<Target> {
    let ds_id = core.hash.hash(subject.data(), predicate.data())?;
    Some(Target {
        ds_id,
        rank: core.placement.rank(ds_id)?,
        offset: core.placement.offset(ds_id)?,
    })
}

fn entry(subject: &Blob, predicate: &Blob, enqueued_at: Instant) -> LedgerEntry {
    LedgerEntry {
        subject: subject.clone(),
        predicate: predicate.clone(),
        enqueued_at,
    }
}

/// A response slot for an item that is no longer in the ledger is spurious
/// (a duplicate or a mismatched token) and materializes nothing.
fn claim(ledger: &mut Ledger, token: u64, op: Op) -> Option<LedgerEntry> {
    let entry = ledger.remove(&token);
    if entry.is_none() {
        log::warn!("Discarding a {op} response slot with unknown token {token}");
    }
    entry
}

impl Queued for PutItem {
    type RequestSlot = PutRequestSlot;
    type ResponseSlot = PutResponseSlot;

    const OP: Op = Op::Put;

    fn token(&self) -> u64 {
        self.token
    }

    fn resolve_target(&mut self, core: &Core) -> Option<Target> {
        if self.target.is_none() {
            self.target = hashed_target(core, &self.subject, &self.predicate);
        }
        self.target
    }

    fn ledger_entry(&self) -> LedgerEntry {
        entry(&self.subject, &self.predicate, self.enqueued_at)
    }

    fn into_slot(self, ds_offset: u32) -> PutRequestSlot {
        PutRequestSlot {
            ds_offset,
            token: self.token,
            subject: self.subject,
            predicate: self.predicate,
            object: self.object,
        }
    }

    fn communicate(
        core: &Core,
        remote: HashMap<u32, Bulk<PutRequestSlot>>,
    ) -> Vec<Bulk<PutResponseSlot>> {
        core.transport.communicate_bput(remote)
    }

    fn dispatch_local(
        server: &RangeServer,
        local: Bulk<PutRequestSlot>,
    ) -> Option<Bulk<PutResponseSlot>> {
        match server.dispatch(&Request::Put(local)) {
            Response::Put(bulk) => Some(bulk),
            _ => None,
        }
    }

    fn result_nodes(
        slot: PutResponseSlot,
        range_server: u32,
        ledger: &mut Ledger,
    ) -> Vec<ResultNode> {
        let Some(entry) = claim(ledger, slot.token, Op::Put) else {
            return Vec::new();
        };
        vec![ResultNode {
            op: Op::Put,
            range_server,
            status: slot.status,
            elapsed: entry.enqueued_at.elapsed(),
            payload: ResultPayload::Put {
                subject: entry.subject,
                predicate: entry.predicate,
            },
        }]
    }
}

impl Queued for GetItem {
    type RequestSlot = GetRequestSlot;
    type ResponseSlot = GetResponseSlot;

    const OP: Op = Op::Get;

    fn token(&self) -> u64 {
        self.token
    }

    fn resolve_target(&mut self, core: &Core) -> Option<Target> {
        if self.target.is_none() {
            self.target = hashed_target(core, &self.subject, &self.predicate);
        }
        self.target
    }

    fn ledger_entry(&self) -> LedgerEntry {
        entry(&self.subject, &self.predicate, self.enqueued_at)
    }

    fn into_slot(self, ds_offset: u32) -> GetRequestSlot {
        GetRequestSlot {
            ds_offset,
            token: self.token,
            subject: self.subject,
            predicate: self.predicate,
            object_type: self.object_type,
        }
    }

    fn communicate(
        core: &Core,
        remote: HashMap<u32, Bulk<GetRequestSlot>>,
    ) -> Vec<Bulk<GetResponseSlot>> {
        core.transport.communicate_bget(remote)
    }

    fn dispatch_local(
        server: &RangeServer,
        local: Bulk<GetRequestSlot>,
    ) -> Option<Bulk<GetResponseSlot>> {
        match server.dispatch(&Request::Get(local)) {
            Response::Get(bulk) => Some(bulk),
            _ => None,
        }
    }

    fn result_nodes(
        slot: GetResponseSlot,
        range_server: u32,
        ledger: &mut Ledger,
    ) -> Vec<ResultNode> {
        let Some(entry) = claim(ledger, slot.token, Op::Get) else {
            return Vec::new();
        };
        vec![ResultNode {
            op: Op::Get,
            range_server,
            status: slot.status,
            elapsed: entry.enqueued_at.elapsed(),
            payload: ResultPayload::Get {
                subject: entry.subject,
                predicate: entry.predicate,
                object_type: slot.object_type,
                object: slot.object,
            },
        }]
    }
}

impl Queued for GetOpItem {
    type RequestSlot = GetOpRequestSlot;
    type ResponseSlot = GetOpResponseSlot;

    const OP: Op = Op::GetOp;

    fn token(&self) -> u64 {
        self.token
    }

    fn resolve_target(&mut self, core: &Core) -> Option<Target> {
        if self.target.is_none() {
            self.target = hashed_target(core, &self.subject, &self.predicate);
        }
        self.target
    }

    fn ledger_entry(&self) -> LedgerEntry {
        entry(&self.subject, &self.predicate, self.enqueued_at)
    }

    fn into_slot(self, ds_offset: u32) -> GetOpRequestSlot {
        GetOpRequestSlot {
            ds_offset,
            token: self.token,
            kind: self.kind,
            subject: self.subject,
            predicate: self.predicate,
            object_type: self.object_type,
            num_recs: self.num_recs,
        }
    }

    fn communicate(
        core: &Core,
        remote: HashMap<u32, Bulk<GetOpRequestSlot>>,
    ) -> Vec<Bulk<GetOpResponseSlot>> {
        core.transport.communicate_bgetop(remote)
    }

    fn dispatch_local(
        server: &RangeServer,
        local: Bulk<GetOpRequestSlot>,
    ) -> Option<Bulk<GetOpResponseSlot>> {
        match server.dispatch(&Request::GetOp(local)) {
            Response::GetOp(bulk) => Some(bulk),
            _ => None,
        }
    }

    /// A GetOp slot expands into one node per returned record, in
    /// iteration order; a slot with no records still yields one node so
    /// the caller sees its status.
    fn result_nodes(
        slot: GetOpResponseSlot,
        range_server: u32,
        ledger: &mut Ledger,
    ) -> Vec<ResultNode> {
        let Some(entry) = claim(ledger, slot.token, Op::GetOp) else {
            return Vec::new();
        };
        let elapsed = entry.enqueued_at.elapsed();

        if slot.records.is_empty() {
            return vec![ResultNode {
                op: Op::GetOp,
                range_server,
                status: slot.status,
                elapsed,
                payload: ResultPayload::GetOp {
                    subject: entry.subject,
                    predicate: entry.predicate,
                    object_type: slot.object_type,
                    object: None,
                },
            }];
        }

        slot.records
            .into_iter()
            .map(|record| ResultNode {
                op: Op::GetOp,
                range_server,
                status: slot.status,
                elapsed,
                payload: ResultPayload::GetOp {
                    subject: record.subject,
                    predicate: record.predicate,
                    object_type: slot.object_type,
                    object: record.object,
                },
            })
            .collect()
    }
}

impl Queued for DeleteItem {
    type RequestSlot = DeleteRequestSlot;
    type ResponseSlot = DeleteResponseSlot;

    const OP: Op = Op::Delete;

    fn token(&self) -> u64 {
        self.token
    }

    fn resolve_target(&mut self, core: &Core) -> Option<Target> {
        if self.target.is_none() {
            self.target = hashed_target(core, &self.subject, &self.predicate);
        }
        self.target
    }

    fn ledger_entry(&self) -> LedgerEntry {
        entry(&self.subject, &self.predicate, self.enqueued_at)
    }

    fn into_slot(self, ds_offset: u32) -> DeleteRequestSlot {
        DeleteRequestSlot {
            ds_offset,
            token: self.token,
            subject: self.subject,
            predicate: self.predicate,
        }
    }

    fn communicate(
        core: &Core,
        remote: HashMap<u32, Bulk<DeleteRequestSlot>>,
    ) -> Vec<Bulk<DeleteResponseSlot>> {
        core.transport.communicate_bdelete(remote)
    }

    fn dispatch_local(
        server: &RangeServer,
        local: Bulk<DeleteRequestSlot>,
    ) -> Option<Bulk<DeleteResponseSlot>> {
        match server.dispatch(&Request::Delete(local)) {
            Response::Delete(bulk) => Some(bulk),
            _ => None,
        }
    }

    fn result_nodes(
        slot: DeleteResponseSlot,
        range_server: u32,
        ledger: &mut Ledger,
    ) -> Vec<ResultNode> {
        let Some(entry) = claim(ledger, slot.token, Op::Delete) else {
            return Vec::new();
        };
        vec![ResultNode {
            op: Op::Delete,
            range_server,
            status: slot.status,
            elapsed: entry.enqueued_at.elapsed(),
            payload: ResultPayload::Delete {
                subject: entry.subject,
                predicate: entry.predicate,
            },
        }]
    }
}

impl Queued for HistogramItem {
    type RequestSlot = HistogramRequestSlot;
    type ResponseSlot = HistogramResponseSlot;

    const OP: Op = Op::Histogram;

    fn token(&self) -> u64 {
        self.token
    }

    /// Histogram requests address a datastore id directly; there is
    /// nothing to hash.
    fn resolve_target(&mut self, core: &Core) -> Option<Target> {
        if self.target.is_none() {
            self.target = Some(Target {
                ds_id: self.ds_id,
                rank: core.placement.rank(self.ds_id)?,
                offset: core.placement.offset(self.ds_id)?,
            });
        }
        self.target
    }

    fn ledger_entry(&self) -> LedgerEntry {
        LedgerEntry {
            subject: Blob::empty(blob::DataType::Byte),
            predicate: Blob::empty(blob::DataType::Byte),
            enqueued_at: self.enqueued_at,
        }
    }

    fn into_slot(self, ds_offset: u32) -> HistogramRequestSlot {
        HistogramRequestSlot {
            ds_offset,
            token: self.token,
            name: Blob::owned(self.name.into_bytes(), blob::DataType::Byte),
        }
    }

    fn communicate(
        core: &Core,
        remote: HashMap<u32, Bulk<HistogramRequestSlot>>,
    ) -> Vec<Bulk<HistogramResponseSlot>> {
        core.transport.communicate_bhistogram(remote)
    }

    fn dispatch_local(
        server: &RangeServer,
        local: Bulk<HistogramRequestSlot>,
    ) -> Option<Bulk<HistogramResponseSlot>> {
        match server.dispatch(&Request::Histogram(local)) {
            Response::Histogram(bulk) => Some(bulk),
            _ => None,
        }
    }

    fn result_nodes(
        slot: HistogramResponseSlot,
        range_server: u32,
        ledger: &mut Ledger,
    ) -> Vec<ResultNode> {
        let Some(entry) = claim(ledger, slot.token, Op::Histogram) else {
            return Vec::new();
        };
        vec![ResultNode {
            op: Op::Histogram,
            range_server,
            status: slot.status,
            elapsed: entry.enqueued_at.elapsed(),
            payload: ResultPayload::Histogram {
                histogram: slot.histogram,
            },
        }]
    }
}
