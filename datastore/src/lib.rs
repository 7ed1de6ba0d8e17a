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

pub mod backend;
pub mod in_memory;
pub mod key;
mod range_server;
#[cfg(feature = "rocksdb")]
pub mod rocks;
pub mod stats;
pub mod transform;

use std::collections::HashMap;

use blob::Blob;
use histogram::Histogram;
use parking_lot::Mutex;
use wire::{
    DeleteRequestSlot, DeleteResponseSlot, GetOpKind, GetOpRecord, GetOpRequestSlot,
    GetOpResponseSlot, GetRequestSlot, GetResponseSlot, HistogramRequestSlot,
    HistogramResponseSlot, PutRequestSlot, PutResponseSlot, Status,
};

use backend::{Backend, ScanDirection, ScanOrigin};
use stats::{DatastoreStats, Event, EventLog};
use transform::Callbacks;

pub use range_server::RangeServer;

/// The reserved subject that histogram snapshots persist under; no user key
/// collides with it because user subjects are hashed as-is while this one is
/// only ever written by the datastore itself.
pub const HISTOGRAM_SUBJECT: &[u8] = b"\x00histogram\x00";

struct Inner {
    backend: Box<dyn Backend>,
    callbacks: Callbacks,
    histograms: HashMap<String, Histogram>,
    events: EventLog,
    write_histograms: bool,
}

///
/// One local storage engine instance, owned by exactly one range server.
///
/// The wrapper owns everything a backend must not know about: the
/// order-preserving payload transforms, the packed-key layout, the named
/// histograms fed by numeric PUTs, and the put/get event streams. All
/// operations on one datastore serialize on its mutex; range servers are
/// parallel across datastores, never within one.
///
pub struct Datastore {
    id: u32,
    inner: Mutex<Inner>,
}

impl Datastore {
    pub fn new(
        id: u32,
        backend: Box<dyn Backend>,
        callbacks: Callbacks,
        histograms: Vec<Histogram>,
        read_histograms: bool,
        write_histograms: bool,
    ) -> Result<Datastore, String> {
        if !backend.usable() {
            return Err(format!(
                "backend {:?} for datastore {id} is not usable",
                backend.name()
            ));
        }

        let mut inner = Inner {
            backend,
            callbacks,
            histograms: histograms
                .into_iter()
                .map(|h| (h.name().to_owned(), h))
                .collect(),
            events: EventLog::default(),
            write_histograms,
        };

        if read_histograms {
            let found = Datastore::read_histograms(&mut inner);
            log::debug!("Datastore {id} reloaded {found} histogram(s)");
        }

        log::info!("Datastore {id} opened over {:?}", inner.backend.name());
        Ok(Datastore {
            id,
            inner: Mutex::new(inner),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn usable(&self) -> bool {
        self.inner.lock().backend.usable()
    }

    ///
    /// Bulk put. Slots whose payloads survive encoding join one batched
    /// write with status `Unset`; the commit then rewrites `Unset` to
    /// `Success`, or every slot to `Error` if the batch fails. Numeric
    /// objects whose predicate names a configured histogram are streamed
    /// into it.
    ///
    pub fn bput(&self, slots: &[PutRequestSlot]) -> Vec<PutResponseSlot> {
        let inner = &mut *self.inner.lock();
        let mut event = Event::begin(slots.len());

        let mut statuses = vec![Status::Error; slots.len()];
        let mut batch = Vec::with_capacity(slots.len());

        for (i, slot) in slots.iter().enumerate() {
            if slot.object.data_type().is_numeric() {
                if let Ok(name) = std::str::from_utf8(slot.predicate.data()) {
                    if let Some(histogram) = inner.histograms.get_mut(name) {
                        if let Some(value) = slot.object.numeric_value() {
                            histogram.add(value);
                        }
                    }
                }
            }

            match encode_key_value(&inner.callbacks, slot) {
                Ok((key, value)) => {
                    event.size += key.len() + value.len();
                    batch.push((key, value));
                    statuses[i] = Status::Unset;
                }
                Err(err) => {
                    log::debug!("Datastore {}: put slot {i} failed to encode: {err}", self.id);
                }
            }
        }

        match inner.backend.put_batch(&batch) {
            Ok(()) => {
                for status in &mut statuses {
                    if *status == Status::Unset {
                        *status = Status::Success;
                    }
                }
            }
            Err(err) => {
                log::warn!("Datastore {}: batched put failed: {err}", self.id);
                for status in &mut statuses {
                    *status = Status::Error;
                }
            }
        }

        inner.events.puts.push(event.finish());

        slots
            .iter()
            .zip(statuses)
            .map(|(slot, status)| PutResponseSlot {
                ds_offset: slot.ds_offset,
                token: slot.token,
                status,
            })
            .collect()
    }

    ///
    /// Bulk get. A missing key is an `Error` for that slot, never a failure
    /// of the batch.
    ///
    pub fn bget(&self, slots: &[GetRequestSlot]) -> Vec<GetResponseSlot> {
        let inner = &mut *self.inner.lock();
        let mut event = Event::begin(slots.len());

        let responses = slots
            .iter()
            .map(|slot| {
                let (status, object) = match self.get_one(inner, slot) {
                    Ok(object) => {
                        event.size += object.len();
                        (Status::Success, Some(object))
                    }
                    Err(err) => {
                        log::debug!("Datastore {}: get missed: {err}", self.id);
                        (Status::Error, None)
                    }
                };
                GetResponseSlot {
                    ds_offset: slot.ds_offset,
                    token: slot.token,
                    status,
                    object_type: slot.object_type,
                    object,
                }
            })
            .collect();

        inner.events.gets.push(event.finish());
        responses
    }

    fn get_one(&self, inner: &Inner, slot: &GetRequestSlot) -> Result<Blob, String> {
        let subject = inner
            .callbacks
            .encode(slot.subject.data_type(), slot.subject.data())?;
        let predicate = inner
            .callbacks
            .encode(slot.predicate.data_type(), slot.predicate.data())?;
        let key = key::sp_to_key(&subject, &predicate);

        let stored = inner
            .backend
            .get(&key)?
            .ok_or_else(|| "key not present".to_owned())?;
        let decoded = inner.callbacks.decode(slot.object_type, &stored)?;
        Ok(Blob::owned(decoded, slot.object_type))
    }

    ///
    /// Bulk iteration. One slot drives one iterator walk; all records in a
    /// slot share its status, partial walks are success, and a walk whose
    /// seek lands nowhere is an error that reports the seek pair back.
    ///
    pub fn bgetop(&self, slots: &[GetOpRequestSlot]) -> Vec<GetOpResponseSlot> {
        let inner = &mut *self.inner.lock();

        slots
            .iter()
            .map(|slot| {
                let mut event = Event::begin(0);
                let response = self.getop_one(inner, slot);
                event.count = response.records.len();
                event.size += response
                    .records
                    .iter()
                    .map(|r| r.object.as_ref().map(Blob::len).unwrap_or(0))
                    .sum::<usize>();
                inner.events.gets.push(event.finish());
                response
            })
            .collect()
    }

    fn getop_one(&self, inner: &Inner, slot: &GetOpRequestSlot) -> GetOpResponseSlot {
        let error_response = |slot: &GetOpRequestSlot| GetOpResponseSlot {
            ds_offset: slot.ds_offset,
            token: slot.token,
            status: Status::Error,
            object_type: slot.object_type,
            records: vec![GetOpRecord {
                subject: slot.subject.clone(),
                predicate: slot.predicate.clone(),
                object: None,
            }],
        };

        // Eq/Next/Prev seek to the packed (subject, predicate) key;
        // First/Last start at a boundary and ignore the seek pair.
        let seek_key = if slot.kind.has_seek_key() {
            let encoded = inner
                .callbacks
                .encode(slot.subject.data_type(), slot.subject.data())
                .and_then(|subject| {
                    inner
                        .callbacks
                        .encode(slot.predicate.data_type(), slot.predicate.data())
                        .map(|predicate| key::sp_to_key(&subject, &predicate))
                });
            match encoded {
                Ok(key) => Some(key),
                Err(err) => {
                    log::debug!("Datastore {}: getop seek key failed to encode: {err}", self.id);
                    return error_response(slot);
                }
            }
        } else {
            None
        };

        let limit = slot.num_recs as usize;
        let scanned = match slot.kind {
            GetOpKind::Eq => {
                let key = seek_key.as_deref().expect("Eq carries a seek key");
                match inner.backend.scan(ScanOrigin::Key(key), ScanDirection::Forward, 1) {
                    // Eq returns the record whose key matches exactly; a
                    // seek that lands on a neighbor is a miss.
                    Ok(records) => Ok(records
                        .into_iter()
                        .filter(|(landed, _)| landed.as_slice() == key)
                        .collect::<Vec<_>>()),
                    Err(err) => Err(err),
                }
            }
            GetOpKind::Next => {
                let key = seek_key.as_deref().expect("Next carries a seek key");
                inner
                    .backend
                    .scan(ScanOrigin::Key(key), ScanDirection::Forward, limit)
            }
            GetOpKind::Prev => {
                let key = seek_key.as_deref().expect("Prev carries a seek key");
                inner
                    .backend
                    .scan(ScanOrigin::Key(key), ScanDirection::Backward, limit)
            }
            GetOpKind::First => inner.backend.scan(ScanOrigin::First, ScanDirection::Forward, limit),
            GetOpKind::Last => inner.backend.scan(ScanOrigin::Last, ScanDirection::Backward, limit),
        };

        let records = match scanned {
            Ok(records) if records.is_empty() => {
                return error_response(slot);
            }
            Ok(records) => records,
            Err(err) => {
                log::debug!("Datastore {}: getop scan failed: {err}", self.id);
                return error_response(slot);
            }
        };

        let mut out = Vec::with_capacity(records.len());
        for (key, value) in records {
            match self.decode_record(inner, slot, &key, &value) {
                Ok(record) => out.push(record),
                Err(err) => {
                    log::debug!("Datastore {}: getop record failed to decode: {err}", self.id);
                    return error_response(slot);
                }
            }
        }

        GetOpResponseSlot {
            ds_offset: slot.ds_offset,
            token: slot.token,
            status: Status::Success,
            object_type: slot.object_type,
            records: out,
        }
    }

    fn decode_record(
        &self,
        inner: &Inner,
        slot: &GetOpRequestSlot,
        key: &[u8],
        value: &[u8],
    ) -> Result<GetOpRecord, String> {
        let (subject, predicate) = key::key_to_sp(key)?;
        let subject = inner.callbacks.decode(slot.subject.data_type(), subject)?;
        let predicate = inner
            .callbacks
            .decode(slot.predicate.data_type(), predicate)?;
        let object = inner.callbacks.decode(slot.object_type, value)?;
        Ok(GetOpRecord {
            subject: Blob::owned(subject, slot.subject.data_type()),
            predicate: Blob::owned(predicate, slot.predicate.data_type()),
            object: Some(Blob::owned(object, slot.object_type)),
        })
    }

    ///
    /// Bulk delete. The batch commits as a whole: commit failure marks
    /// every slot `Error`. Deleting an absent key is not an error.
    ///
    pub fn bdelete(&self, slots: &[DeleteRequestSlot]) -> Vec<DeleteResponseSlot> {
        let inner = &mut *self.inner.lock();

        let mut statuses = vec![Status::Error; slots.len()];
        let mut keys = Vec::with_capacity(slots.len());

        for (i, slot) in slots.iter().enumerate() {
            let encoded = inner
                .callbacks
                .encode(slot.subject.data_type(), slot.subject.data())
                .and_then(|subject| {
                    inner
                        .callbacks
                        .encode(slot.predicate.data_type(), slot.predicate.data())
                        .map(|predicate| key::sp_to_key(&subject, &predicate))
                });
            match encoded {
                Ok(key) => {
                    keys.push(key);
                    statuses[i] = Status::Unset;
                }
                Err(err) => {
                    log::debug!("Datastore {}: delete slot {i} failed to encode: {err}", self.id);
                }
            }
        }

        match inner.backend.delete_batch(&keys) {
            Ok(()) => {
                for status in &mut statuses {
                    if *status == Status::Unset {
                        *status = Status::Success;
                    }
                }
            }
            Err(err) => {
                log::warn!("Datastore {}: batched delete failed: {err}", self.id);
                for status in &mut statuses {
                    *status = Status::Error;
                }
            }
        }

        slots
            .iter()
            .zip(statuses)
            .map(|(slot, status)| DeleteResponseSlot {
                ds_offset: slot.ds_offset,
                token: slot.token,
                status,
            })
            .collect()
    }

    /// Look configured histograms up by name; the response carries copies
    /// so callers never alias live estimator state.
    pub fn bhistogram(&self, slots: &[HistogramRequestSlot]) -> Vec<HistogramResponseSlot> {
        let inner = self.inner.lock();

        slots
            .iter()
            .map(|slot| {
                let histogram = std::str::from_utf8(slot.name.data())
                    .ok()
                    .and_then(|name| inner.histograms.get(name))
                    .cloned();
                let status = if histogram.is_some() {
                    Status::Success
                } else {
                    Status::Error
                };
                HistogramResponseSlot {
                    ds_offset: slot.ds_offset,
                    token: slot.token,
                    status,
                    histogram,
                }
            })
            .collect()
    }

    pub fn sync(&self) -> Status {
        let inner = &mut *self.inner.lock();
        match inner.backend.sync() {
            Ok(()) => Status::Success,
            Err(err) => {
                log::warn!("Datastore {}: sync failed: {err}", self.id);
                Status::Error
            }
        }
    }

    pub fn stats(&self) -> DatastoreStats {
        self.inner.lock().events.aggregate()
    }

    /// Persist every configured histogram under the reserved subject.
    pub fn write_histograms(&self) -> Result<(), String> {
        let inner = &mut *self.inner.lock();
        Datastore::write_histograms_inner(inner)
    }

    fn write_histograms_inner(inner: &mut Inner) -> Result<(), String> {
        let mut batch = Vec::with_capacity(inner.histograms.len());
        for (name, histogram) in &inner.histograms {
            let key = key::sp_to_key(HISTOGRAM_SUBJECT, name.as_bytes());
            let mut packed = Vec::new();
            histogram.pack(&mut packed);
            batch.push((key, packed));
        }
        inner.backend.put_batch(&batch)
    }

    /// Reload any configured histogram that has a persisted snapshot,
    /// overwriting the in-memory instance. Returns how many were found.
    fn read_histograms(inner: &mut Inner) -> usize {
        let mut found = 0;
        let names: Vec<String> = inner.histograms.keys().cloned().collect();
        for name in names {
            let key = key::sp_to_key(HISTOGRAM_SUBJECT, name.as_bytes());
            let stored = match inner.backend.get(&key) {
                Ok(Some(stored)) => stored,
                Ok(None) => continue,
                Err(err) => {
                    log::warn!("Failed to read persisted histogram {name:?}: {err}");
                    continue;
                }
            };
            let mut cursor = blob::codec::Cursor::new(bytes::Bytes::from(stored));
            match Histogram::unpack(&mut cursor, histogram::uniform(10)) {
                Ok(histogram) => {
                    inner.histograms.insert(name, histogram);
                    found += 1;
                }
                Err(err) => {
                    log::warn!("Persisted histogram {name:?} failed to unpack: {err}");
                }
            }
        }
        found
    }

    /// Write histograms if configured, then tear the backend down. A closed
    /// datastore reports `usable() == false`.
    pub fn close(&self) {
        let inner = &mut *self.inner.lock();
        if inner.write_histograms {
            if let Err(err) = Datastore::write_histograms_inner(inner) {
                log::warn!("Datastore {}: failed to persist histograms: {err}", self.id);
            }
        }
        inner.backend.close();
        log::info!("Datastore {} closed", self.id);
    }
}

fn encode_key_value(
    callbacks: &Callbacks,
    slot: &PutRequestSlot,
) -> Result<(Vec<u8>, Vec<u8>), String> {
    let subject = callbacks.encode(slot.subject.data_type(), slot.subject.data())?;
    let predicate = callbacks.encode(slot.predicate.data_type(), slot.predicate.data())?;
    let object = callbacks.encode(slot.object.data_type(), slot.object.data())?;
    Ok((key::sp_to_key(&subject, &predicate), object))
}

#[cfg(test)]
mod tests;
