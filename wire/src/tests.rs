// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use blob::{Blob, DataType};
use bytes::Bytes;
use histogram::uniform;

use crate::{
    Bulk, DeleteRequestSlot, DeleteResponseSlot, GetOpKind, GetOpRecord, GetOpRequestSlot,
    GetOpResponseSlot, GetRequestSlot, GetResponseSlot, HistogramRequestSlot,
    HistogramResponseSlot, Op, PackError, PutRequestSlot, PutResponseSlot, Request, Response,
    Status,
};

fn byte_blob(data: &[u8]) -> Blob {
    Blob::owned(data.to_vec(), DataType::Byte)
}

fn put_request() -> Request {
    let mut bulk = Bulk::new(3, 7, 4);
    bulk.slots.push(PutRequestSlot {
        ds_offset: 0,
        token: 100,
        subject: byte_blob(b"s1"),
        predicate: byte_blob(b"p1"),
        object: byte_blob(b"o1"),
    });
    bulk.slots.push(PutRequestSlot {
        ds_offset: 2,
        token: 101,
        subject: byte_blob(b"s2"),
        predicate: byte_blob(b"p2"),
        object: Blob::from_f64(2.5),
    });
    Request::Put(bulk)
}

#[test]
fn put_request_round_trip() {
    let request = put_request();
    let unpacked = Request::unpack(Bytes::from(request.pack())).unwrap();
    assert_eq!(unpacked, request);
    assert_eq!(unpacked.op(), Op::Put);
    assert_eq!(unpacked.src(), 3);
    assert_eq!(unpacked.dst(), 7);
    assert_eq!(unpacked.count(), 2);
}

#[test]
fn get_request_round_trip() {
    let mut bulk = Bulk::new(0, 1, 2);
    bulk.slots.push(GetRequestSlot {
        ds_offset: 1,
        token: 5,
        subject: byte_blob(b"subject"),
        predicate: byte_blob(b"predicate"),
        object_type: DataType::Double,
    });
    let request = Request::Get(bulk);
    assert_eq!(Request::unpack(Bytes::from(request.pack())).unwrap(), request);
}

#[test]
fn getop_request_round_trip_with_and_without_seek_key() {
    let mut bulk = Bulk::new(0, 0, 4);
    bulk.slots.push(GetOpRequestSlot {
        ds_offset: 0,
        token: 1,
        kind: GetOpKind::Next,
        subject: byte_blob(b"s"),
        predicate: byte_blob(b"p"),
        object_type: DataType::Byte,
        num_recs: 10,
    });
    // First ignores the seek key: it is dropped on the wire and comes back
    // empty.
    bulk.slots.push(GetOpRequestSlot {
        ds_offset: 1,
        token: 2,
        kind: GetOpKind::First,
        subject: Blob::empty(DataType::Byte),
        predicate: Blob::empty(DataType::Byte),
        object_type: DataType::Byte,
        num_recs: 3,
    });
    let request = Request::GetOp(bulk);
    assert_eq!(Request::unpack(Bytes::from(request.pack())).unwrap(), request);
}

#[test]
fn getop_request_drops_seek_key_for_boundary_ops() {
    let mut bulk = Bulk::new(0, 0, 1);
    bulk.slots.push(GetOpRequestSlot {
        ds_offset: 0,
        token: 9,
        kind: GetOpKind::Last,
        subject: byte_blob(b"ignored"),
        predicate: byte_blob(b"ignored"),
        object_type: DataType::Byte,
        num_recs: 1,
    });
    let request = Request::GetOp(bulk);
    match Request::unpack(Bytes::from(request.pack())).unwrap() {
        Request::GetOp(bulk) => {
            assert!(bulk.slots[0].subject.is_empty());
            assert!(bulk.slots[0].predicate.is_empty());
        }
        other => panic!("expected GetOp, got {other:?}"),
    }
}

#[test]
fn delete_and_histogram_request_round_trip() {
    let mut deletes = Bulk::new(2, 3, 1);
    deletes.slots.push(DeleteRequestSlot {
        ds_offset: 3,
        token: 77,
        subject: byte_blob(b"s"),
        predicate: byte_blob(b"p"),
    });
    let request = Request::Delete(deletes);
    assert_eq!(Request::unpack(Bytes::from(request.pack())).unwrap(), request);

    let mut histograms = Bulk::new(2, 3, 1);
    histograms.slots.push(HistogramRequestSlot {
        ds_offset: 0,
        token: 78,
        name: byte_blob(b"latency"),
    });
    let request = Request::Histogram(histograms);
    assert_eq!(Request::unpack(Bytes::from(request.pack())).unwrap(), request);
}

#[test]
fn put_and_delete_response_round_trip() {
    let mut puts = Bulk::new(7, 3, 2);
    puts.slots.push(PutResponseSlot {
        ds_offset: 0,
        token: 100,
        status: Status::Success,
    });
    puts.slots.push(PutResponseSlot {
        ds_offset: 2,
        token: 101,
        status: Status::Error,
    });
    let response = Response::Put(puts);
    let unpacked = Response::unpack(Bytes::from(response.pack())).unwrap();
    assert_eq!(unpacked, response);
    assert_eq!(unpacked.src(), 7);

    let mut deletes = Bulk::new(1, 0, 1);
    deletes.slots.push(DeleteResponseSlot {
        ds_offset: 0,
        token: 8,
        status: Status::Success,
    });
    let response = Response::Delete(deletes);
    assert_eq!(
        Response::unpack(Bytes::from(response.pack())).unwrap(),
        response
    );
}

#[test]
fn get_response_carries_object_only_on_success() {
    let mut bulk = Bulk::new(0, 0, 2);
    bulk.slots.push(GetResponseSlot {
        ds_offset: 0,
        token: 1,
        status: Status::Success,
        object_type: DataType::Byte,
        object: Some(byte_blob(b"found")),
    });
    bulk.slots.push(GetResponseSlot {
        ds_offset: 0,
        token: 2,
        status: Status::Error,
        object_type: DataType::Byte,
        object: None,
    });
    let response = Response::Get(bulk);
    let packed = response.pack();
    let unpacked = Response::unpack(Bytes::from(packed)).unwrap();
    assert_eq!(unpacked, response);
}

#[test]
fn getop_response_round_trip() {
    let mut bulk = Bulk::new(0, 0, 2);
    bulk.slots.push(GetOpResponseSlot {
        ds_offset: 1,
        token: 4,
        status: Status::Success,
        object_type: DataType::Byte,
        records: vec![
            GetOpRecord {
                subject: byte_blob(b"s1"),
                predicate: byte_blob(b"p"),
                object: Some(byte_blob(b"o1")),
            },
            GetOpRecord {
                subject: byte_blob(b"s2"),
                predicate: byte_blob(b"p"),
                object: Some(byte_blob(b"o2")),
            },
        ],
    });
    // An error slot reports the seek pair with no objects.
    bulk.slots.push(GetOpResponseSlot {
        ds_offset: 1,
        token: 5,
        status: Status::Error,
        object_type: DataType::Byte,
        records: vec![GetOpRecord {
            subject: byte_blob(b"missing"),
            predicate: byte_blob(b"p"),
            object: None,
        }],
    });
    let response = Response::GetOp(bulk);
    assert_eq!(
        Response::unpack(Bytes::from(response.pack())).unwrap(),
        response
    );
}

#[test]
fn histogram_response_round_trip() {
    let mut hist = histogram::Histogram::new("latency", 2, uniform(2));
    hist.add(1.0);
    hist.add(2.0);

    let mut bulk = Bulk::new(0, 0, 1);
    bulk.slots.push(HistogramResponseSlot {
        ds_offset: 0,
        token: 11,
        status: Status::Success,
        histogram: Some(hist),
    });
    let response = Response::Histogram(bulk);
    assert_eq!(
        Response::unpack(Bytes::from(response.pack())).unwrap(),
        response
    );
}

#[test]
fn response_and_request_slot_counts_match() {
    // Batch-slot parity: a response built slot-for-slot from a request has
    // the same count and one status per slot.
    let request = put_request();
    let count = request.count();
    let mut response = Bulk::new(request.dst(), request.src(), count);
    if let Request::Put(bulk) = &request {
        for slot in &bulk.slots {
            response.slots.push(PutResponseSlot {
                ds_offset: slot.ds_offset,
                token: slot.token,
                status: Status::Success,
            });
        }
    }
    assert_eq!(response.count(), count);
}

#[test]
fn unpack_rejects_wrong_direction_and_bad_tags() {
    let request = put_request();
    let packed = request.pack();

    // A request is not a response.
    assert!(matches!(
        Response::unpack(Bytes::from(packed.clone())),
        Err(PackError::BadTag(_))
    ));

    // Corrupt the op tag.
    let mut corrupted = packed.clone();
    corrupted[1] = 0xff;
    assert!(matches!(
        Request::unpack(Bytes::from(corrupted)),
        Err(PackError::BadTag(0xff))
    ));

    // Truncation surfaces as a short buffer.
    let truncated = packed[..packed.len() - 3].to_vec();
    assert!(matches!(
        Request::unpack(Bytes::from(truncated)),
        Err(PackError::ShortBuffer { .. })
    ));
}

#[test]
fn bulk_push_respects_capacity() {
    let mut bulk: Bulk<u32> = Bulk::new(0, 0, 2);
    assert!(bulk.push(1).is_ok());
    assert!(bulk.push(2).is_ok());
    assert!(bulk.is_full());
    assert_eq!(bulk.push(3), Err(3));
    assert_eq!(bulk.count(), 2);
    assert_eq!(bulk.fill_ratio(), 1.0);
}
