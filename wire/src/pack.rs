// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The packing half of the codec. `unpack.rs` is its mechanical mirror;
//! the two must write and read the exact same field sequence.

use blob::codec;

use crate::{
    Bulk, DeleteRequest, DeleteResponse, Direction, GetOpRequest, GetOpResponse, GetRequest,
    GetResponse, HistogramRequest, HistogramResponse, Op, PutRequest, PutResponse, Request,
    Response, Status,
};

fn pack_header<S>(buf: &mut Vec<u8>, direction: Direction, op: Op, bulk: &Bulk<S>, offsets: &[u32]) {
    codec::put_u8(buf, direction.into());
    codec::put_u8(buf, op.into());
    codec::put_u32(buf, bulk.src);
    codec::put_u32(buf, bulk.dst);
    codec::put_u64(buf, bulk.slots.len() as u64);
    for offset in offsets {
        codec::put_u32(buf, *offset);
    }
}

fn pack_status(buf: &mut Vec<u8>, status: Status) {
    codec::put_u8(buf, status.into());
}

fn pack_put_request(buf: &mut Vec<u8>, bulk: &PutRequest) {
    let offsets: Vec<u32> = bulk.slots.iter().map(|s| s.ds_offset).collect();
    pack_header(buf, Direction::Request, Op::Put, bulk, &offsets);
    for slot in &bulk.slots {
        slot.subject.pack(buf);
        slot.predicate.pack(buf);
        codec::put_u64(buf, slot.token);
        codec::put_u8(buf, slot.object.data_type().into());
        slot.object.pack(buf);
    }
}

fn pack_get_request(buf: &mut Vec<u8>, bulk: &GetRequest) {
    let offsets: Vec<u32> = bulk.slots.iter().map(|s| s.ds_offset).collect();
    pack_header(buf, Direction::Request, Op::Get, bulk, &offsets);
    for slot in &bulk.slots {
        slot.subject.pack(buf);
        slot.predicate.pack(buf);
        codec::put_u64(buf, slot.token);
        codec::put_u8(buf, slot.object_type.into());
    }
}

fn pack_getop_request(buf: &mut Vec<u8>, bulk: &GetOpRequest) {
    let offsets: Vec<u32> = bulk.slots.iter().map(|s| s.ds_offset).collect();
    pack_header(buf, Direction::Request, Op::GetOp, bulk, &offsets);
    for slot in &bulk.slots {
        codec::put_u8(buf, slot.kind.into());
        // First and Last ignore the seek key, so it never crosses the wire.
        if slot.kind.has_seek_key() {
            slot.subject.pack(buf);
            slot.predicate.pack(buf);
        }
        codec::put_u64(buf, slot.token);
        codec::put_u8(buf, slot.object_type.into());
        codec::put_u64(buf, slot.num_recs);
    }
}

fn pack_delete_request(buf: &mut Vec<u8>, bulk: &DeleteRequest) {
    let offsets: Vec<u32> = bulk.slots.iter().map(|s| s.ds_offset).collect();
    pack_header(buf, Direction::Request, Op::Delete, bulk, &offsets);
    for slot in &bulk.slots {
        slot.subject.pack(buf);
        slot.predicate.pack(buf);
        codec::put_u64(buf, slot.token);
    }
}

fn pack_histogram_request(buf: &mut Vec<u8>, bulk: &HistogramRequest) {
    let offsets: Vec<u32> = bulk.slots.iter().map(|s| s.ds_offset).collect();
    pack_header(buf, Direction::Request, Op::Histogram, bulk, &offsets);
    for slot in &bulk.slots {
        slot.name.pack(buf);
        codec::put_u64(buf, slot.token);
    }
}

fn pack_put_response(buf: &mut Vec<u8>, bulk: &PutResponse) {
    let offsets: Vec<u32> = bulk.slots.iter().map(|s| s.ds_offset).collect();
    pack_header(buf, Direction::Response, Op::Put, bulk, &offsets);
    for slot in &bulk.slots {
        codec::put_u64(buf, slot.token);
        pack_status(buf, slot.status);
    }
}

fn pack_get_response(buf: &mut Vec<u8>, bulk: &GetResponse) {
    let offsets: Vec<u32> = bulk.slots.iter().map(|s| s.ds_offset).collect();
    pack_header(buf, Direction::Response, Op::Get, bulk, &offsets);
    for slot in &bulk.slots {
        codec::put_u64(buf, slot.token);
        pack_status(buf, slot.status);
        codec::put_u8(buf, slot.object_type.into());
        // The object is only present on success.
        if slot.status == Status::Success {
            if let Some(object) = &slot.object {
                object.pack(buf);
            }
        }
    }
}

fn pack_getop_response(buf: &mut Vec<u8>, bulk: &GetOpResponse) {
    let offsets: Vec<u32> = bulk.slots.iter().map(|s| s.ds_offset).collect();
    pack_header(buf, Direction::Response, Op::GetOp, bulk, &offsets);
    for slot in &bulk.slots {
        codec::put_u64(buf, slot.token);
        pack_status(buf, slot.status);
        codec::put_u8(buf, slot.object_type.into());
        codec::put_u64(buf, slot.records.len() as u64);
        for record in &slot.records {
            record.subject.pack(buf);
            record.predicate.pack(buf);
            if slot.status == Status::Success {
                if let Some(object) = &record.object {
                    object.pack(buf);
                }
            }
        }
    }
}

fn pack_delete_response(buf: &mut Vec<u8>, bulk: &DeleteResponse) {
    let offsets: Vec<u32> = bulk.slots.iter().map(|s| s.ds_offset).collect();
    pack_header(buf, Direction::Response, Op::Delete, bulk, &offsets);
    for slot in &bulk.slots {
        codec::put_u64(buf, slot.token);
        pack_status(buf, slot.status);
    }
}

fn pack_histogram_response(buf: &mut Vec<u8>, bulk: &HistogramResponse) {
    let offsets: Vec<u32> = bulk.slots.iter().map(|s| s.ds_offset).collect();
    pack_header(buf, Direction::Response, Op::Histogram, bulk, &offsets);
    for slot in &bulk.slots {
        codec::put_u64(buf, slot.token);
        pack_status(buf, slot.status);
        if slot.status == Status::Success {
            if let Some(histogram) = &slot.histogram {
                histogram.pack(buf);
            }
        }
    }
}

impl Request {
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Request::Put(bulk) => pack_put_request(&mut buf, bulk),
            Request::Get(bulk) => pack_get_request(&mut buf, bulk),
            Request::GetOp(bulk) => pack_getop_request(&mut buf, bulk),
            Request::Delete(bulk) => pack_delete_request(&mut buf, bulk),
            Request::Histogram(bulk) => pack_histogram_request(&mut buf, bulk),
        }
        buf
    }
}

impl Response {
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Response::Put(bulk) => pack_put_response(&mut buf, bulk),
            Response::Get(bulk) => pack_get_response(&mut buf, bulk),
            Response::GetOp(bulk) => pack_getop_response(&mut buf, bulk),
            Response::Delete(bulk) => pack_delete_response(&mut buf, bulk),
            Response::Histogram(bulk) => pack_histogram_response(&mut buf, bulk),
        }
        buf
    }
}
