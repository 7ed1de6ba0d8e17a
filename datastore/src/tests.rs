// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::sync::Arc;

use blob::{Blob, DataType};
use histogram::{uniform, Histogram};
use rand::Rng;
use wire::{
    Bulk, DeleteRequestSlot, GetOpKind, GetOpRequestSlot, GetRequestSlot, HistogramRequestSlot,
    PutRequestSlot, Request, Response, Status,
};

use crate::backend::{Backend, ScanDirection, ScanOrigin};
use crate::in_memory::InMemory;
use crate::key::{key_to_sp, sp_to_key};
use crate::transform::Callbacks;
use crate::{Datastore, RangeServer, HISTOGRAM_SUBJECT};

fn byte_blob(data: &[u8]) -> Blob {
    Blob::owned(data.to_vec(), DataType::Byte)
}

fn test_datastore(id: u32) -> Datastore {
    Datastore::new(
        id,
        Box::new(InMemory::new(format!("test-{id}"))),
        Callbacks::default_callbacks(),
        Vec::new(),
        false,
        false,
    )
    .unwrap()
}

fn put_slot(subject: &[u8], predicate: &[u8], object: Blob) -> PutRequestSlot {
    PutRequestSlot {
        ds_offset: 0,
        token: 0,
        subject: byte_blob(subject),
        predicate: byte_blob(predicate),
        object,
    }
}

fn get_slot(subject: &[u8], predicate: &[u8], object_type: DataType) -> GetRequestSlot {
    GetRequestSlot {
        ds_offset: 0,
        token: 0,
        subject: byte_blob(subject),
        predicate: byte_blob(predicate),
        object_type,
    }
}

mod keys {
    use super::*;

    #[test]
    fn round_trip() {
        for (subject, predicate) in [
            (&b"s"[..], &b"p"[..]),
            (&b""[..], &b"p"[..]),
            (&b"subject"[..], &b""[..]),
            (&b"a longer subject"[..], &b"a longer predicate"[..]),
        ] {
            let key = sp_to_key(subject, predicate);
            let (s, p) = key_to_sp(&key).unwrap();
            assert_eq!(s, subject);
            assert_eq!(p, predicate);
        }
    }

    #[test]
    fn byte_order_groups_by_subject_then_predicate() {
        let mut pairs: Vec<(&[u8], &[u8])> = vec![
            (b"a", b"p2"),
            (b"a", b"p1"),
            (b"ab", b"p1"),
            (b"b", b"p0"),
            (b"a", b"p10"),
        ];
        let mut keys: Vec<Vec<u8>> = pairs.iter().map(|(s, p)| sp_to_key(s, p)).collect();

        pairs.sort();
        keys.sort();

        let recovered: Vec<(&[u8], &[u8])> = keys.iter().map(|k| key_to_sp(k).unwrap()).collect();
        assert_eq!(recovered, pairs);
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(key_to_sp(b"short").is_err());
        // A predicate length that overruns the key.
        let mut key = sp_to_key(b"s", b"p");
        let last = key.len() - 1;
        key[last] = 0xff;
        assert!(key_to_sp(&key).is_err());
    }
}

mod transforms {
    use super::*;

    fn check_monotone_and_exact(data_type: DataType, values: Vec<Vec<u8>>) {
        let callbacks = Callbacks::default_callbacks();
        let encoded: Vec<Vec<u8>> = values
            .iter()
            .map(|v| callbacks.encode(data_type, v).unwrap())
            .collect();

        for window in encoded.windows(2) {
            assert!(
                window[0] < window[1],
                "{data_type} encoding is not monotone"
            );
        }
        for (raw, enc) in values.iter().zip(&encoded) {
            assert_eq!(&callbacks.decode(data_type, enc).unwrap(), raw);
        }
    }

    #[test]
    fn signed_integers_sort_numerically() {
        let values: Vec<i64> = vec![i64::MIN, -100_000, -1, 0, 1, 42, i64::MAX];
        check_monotone_and_exact(
            DataType::Int64,
            values.iter().map(|v| v.to_le_bytes().to_vec()).collect(),
        );

        let values: Vec<i32> = vec![i32::MIN, -7, 0, 7, i32::MAX];
        check_monotone_and_exact(
            DataType::Int32,
            values.iter().map(|v| v.to_le_bytes().to_vec()).collect(),
        );
    }

    #[test]
    fn unsigned_integers_sort_numerically() {
        let values: Vec<u64> = vec![0, 1, 255, 256, 1 << 40, u64::MAX];
        check_monotone_and_exact(
            DataType::UInt64,
            values.iter().map(|v| v.to_le_bytes().to_vec()).collect(),
        );

        let values: Vec<u32> = vec![0, 9, 10, u32::MAX];
        check_monotone_and_exact(
            DataType::UInt32,
            values.iter().map(|v| v.to_le_bytes().to_vec()).collect(),
        );
    }

    #[test]
    fn floats_sort_numerically() {
        let values: Vec<f64> = vec![
            f64::NEG_INFINITY,
            -1.0e300,
            -2.5,
            -1.0e-300,
            0.0,
            1.0e-300,
            1.0,
            2.5,
            1.0e300,
            f64::INFINITY,
        ];
        check_monotone_and_exact(
            DataType::Double,
            values.iter().map(|v| v.to_le_bytes().to_vec()).collect(),
        );

        let values: Vec<f32> = vec![f32::MIN, -1.5, -0.0, 0.5, f32::MAX];
        check_monotone_and_exact(
            DataType::Float,
            values.iter().map(|v| v.to_le_bytes().to_vec()).collect(),
        );
    }

    #[test]
    fn random_doubles_round_trip_in_order() {
        let mut rng = rand::thread_rng();
        let mut values: Vec<f64> = (0..256).map(|_| rng.gen_range(-1.0e9..1.0e9)).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        values.dedup();
        check_monotone_and_exact(
            DataType::Double,
            values.iter().map(|v| v.to_le_bytes().to_vec()).collect(),
        );
    }

    #[test]
    fn bytes_pass_through() {
        let callbacks = Callbacks::default_callbacks();
        let raw = b"anything at all".to_vec();
        assert_eq!(callbacks.encode(DataType::Byte, &raw).unwrap(), raw);
        assert_eq!(callbacks.decode(DataType::Byte, &raw).unwrap(), raw);
    }

    #[test]
    fn wrong_width_is_an_error() {
        let callbacks = Callbacks::default_callbacks();
        assert!(callbacks.encode(DataType::Int32, b"abc").is_err());
        assert!(callbacks.decode(DataType::Double, b"short").is_err());
    }
}

mod scans {
    use super::*;

    fn seeded() -> InMemory {
        let mut backend = InMemory::new("scan");
        let items: Vec<(Vec<u8>, Vec<u8>)> = [b"b", b"d", b"f"]
            .iter()
            .map(|k| (k.to_vec(), k.to_vec()))
            .collect();
        backend.put_batch(&items).unwrap();
        backend
    }

    #[test]
    fn forward_seek_lands_on_the_first_key_at_or_after() {
        let backend = seeded();
        let records = backend
            .scan(ScanOrigin::Key(b"c"), ScanDirection::Forward, 10)
            .unwrap();
        let keys: Vec<&[u8]> = records.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"d".as_slice(), b"f".as_slice()]);
    }

    #[test]
    fn backward_seek_walks_down_from_the_landing_key() {
        let backend = seeded();
        let records = backend
            .scan(ScanOrigin::Key(b"d"), ScanDirection::Backward, 10)
            .unwrap();
        let keys: Vec<&[u8]> = records.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"d".as_slice(), b"b".as_slice()]);
    }

    #[test]
    fn seek_past_the_end_is_empty_even_backward() {
        let backend = seeded();
        assert!(backend
            .scan(ScanOrigin::Key(b"z"), ScanDirection::Backward, 10)
            .unwrap()
            .is_empty());
        assert!(backend
            .scan(ScanOrigin::Key(b"z"), ScanDirection::Forward, 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn boundaries_ignore_keys() {
        let backend = seeded();
        let first = backend.scan(ScanOrigin::First, ScanDirection::Forward, 2).unwrap();
        assert_eq!(first[0].0, b"b".to_vec());
        let last = backend.scan(ScanOrigin::Last, ScanDirection::Backward, 2).unwrap();
        assert_eq!(last[0].0, b"f".to_vec());
    }
}

mod operations {
    use super::*;

    #[test]
    fn put_then_get() {
        let ds = test_datastore(0);
        let puts = ds.bput(&[put_slot(b"s", b"p", byte_blob(b"o"))]);
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].status, Status::Success);

        let gets = ds.bget(&[get_slot(b"s", b"p", DataType::Byte)]);
        assert_eq!(gets.len(), 1);
        assert_eq!(gets[0].status, Status::Success);
        assert_eq!(gets[0].object.as_ref().unwrap().data(), b"o");
    }

    #[test]
    fn get_of_missing_key_is_a_slot_error() {
        let ds = test_datastore(0);
        let gets = ds.bget(&[get_slot(b"nope", b"p", DataType::Byte)]);
        assert_eq!(gets[0].status, Status::Error);
        assert!(gets[0].object.is_none());
    }

    #[test]
    fn one_bad_slot_does_not_halt_the_batch() {
        let ds = test_datastore(0);
        ds.bput(&[put_slot(b"s", b"p", byte_blob(b"o"))]);

        let gets = ds.bget(&[
            get_slot(b"missing", b"p", DataType::Byte),
            get_slot(b"s", b"p", DataType::Byte),
        ]);
        assert_eq!(gets[0].status, Status::Error);
        assert_eq!(gets[1].status, Status::Success);
    }

    #[test]
    fn numeric_objects_round_trip_through_the_transforms() {
        let ds = test_datastore(0);
        ds.bput(&[put_slot(b"s", b"p", Blob::from_f64(-2.5))]);

        let gets = ds.bget(&[get_slot(b"s", b"p", DataType::Double)]);
        assert_eq!(gets[0].status, Status::Success);
        assert_eq!(gets[0].object.as_ref().unwrap().as_f64(), Some(-2.5));
    }

    #[test]
    fn replacing_an_object_keeps_one_record() {
        let ds = test_datastore(0);
        ds.bput(&[put_slot(b"s", b"p", byte_blob(b"first"))]);
        ds.bput(&[put_slot(b"s", b"p", byte_blob(b"second"))]);

        let gets = ds.bget(&[get_slot(b"s", b"p", DataType::Byte)]);
        assert_eq!(gets[0].object.as_ref().unwrap().data(), b"second");

        let scans = ds.bgetop(&[GetOpRequestSlot {
            ds_offset: 0,
            token: 0,
            kind: GetOpKind::First,
            subject: Blob::empty(DataType::Byte),
            predicate: Blob::empty(DataType::Byte),
            object_type: DataType::Byte,
            num_recs: 10,
        }]);
        assert_eq!(scans[0].records.len(), 1);
    }

    #[test]
    fn delete_removes_exactly_the_named_pair() {
        let ds = test_datastore(0);
        ds.bput(&[
            put_slot(b"s1", b"p", byte_blob(b"o1")),
            put_slot(b"s2", b"p", byte_blob(b"o2")),
        ]);

        let dels = ds.bdelete(&[DeleteRequestSlot {
            ds_offset: 0,
            token: 0,
            subject: byte_blob(b"s1"),
            predicate: byte_blob(b"p"),
        }]);
        assert_eq!(dels[0].status, Status::Success);

        assert_eq!(
            ds.bget(&[get_slot(b"s1", b"p", DataType::Byte)])[0].status,
            Status::Error
        );
        assert_eq!(
            ds.bget(&[get_slot(b"s2", b"p", DataType::Byte)])[0].status,
            Status::Success
        );
    }

    #[test]
    fn deleting_an_absent_key_is_not_an_error() {
        let ds = test_datastore(0);
        let dels = ds.bdelete(&[DeleteRequestSlot {
            ds_offset: 0,
            token: 0,
            subject: byte_blob(b"never-put"),
            predicate: byte_blob(b"p"),
        }]);
        assert_eq!(dels[0].status, Status::Success);
    }

    #[test]
    fn stats_only_grow() {
        let ds = test_datastore(0);
        let before = ds.stats();
        assert_eq!(before.num_puts, 0);

        ds.bput(&[put_slot(b"s", b"p", byte_blob(b"o"))]);
        let after_put = ds.stats();
        assert_eq!(after_put.num_puts, 1);
        assert!(after_put.put_time >= before.put_time);

        ds.bget(&[get_slot(b"s", b"p", DataType::Byte)]);
        ds.bget(&[get_slot(b"s", b"p", DataType::Byte)]);
        let after_get = ds.stats();
        assert_eq!(after_get.num_gets, 2);
        assert!(after_get.get_time >= after_put.get_time);
        assert_eq!(after_get.num_puts, 1);
    }
}

mod getop {
    use super::*;

    fn seeded() -> Datastore {
        let ds = test_datastore(0);
        ds.bput(&[
            put_slot(b"s1", b"p", byte_blob(b"o1")),
            put_slot(b"s2", b"p", byte_blob(b"o2")),
            put_slot(b"s3", b"p", byte_blob(b"o3")),
        ]);
        ds
    }

    fn getop_slot(
        subject: &[u8],
        predicate: &[u8],
        kind: GetOpKind,
        num_recs: u64,
    ) -> GetOpRequestSlot {
        GetOpRequestSlot {
            ds_offset: 0,
            token: 0,
            kind,
            subject: byte_blob(subject),
            predicate: byte_blob(predicate),
            object_type: DataType::Byte,
            num_recs,
        }
    }

    fn subjects(slot: &wire::GetOpResponseSlot) -> Vec<Vec<u8>> {
        slot.records.iter().map(|r| r.subject.data().to_vec()).collect()
    }

    #[test]
    fn eq_returns_only_an_exact_match() {
        let ds = seeded();
        let hit = ds.bgetop(&[getop_slot(b"s2", b"p", GetOpKind::Eq, 5)]);
        assert_eq!(hit[0].status, Status::Success);
        assert_eq!(subjects(&hit[0]), vec![b"s2".to_vec()]);
        assert_eq!(hit[0].records[0].object.as_ref().unwrap().data(), b"o2");

        // A seek that lands on a neighbor is a miss.
        let miss = ds.bgetop(&[getop_slot(b"s2a", b"p", GetOpKind::Eq, 5)]);
        assert_eq!(miss[0].status, Status::Error);
        assert!(miss[0].records[0].object.is_none());
    }

    #[test]
    fn next_walks_forward_from_the_seek_key() {
        let ds = seeded();
        let out = ds.bgetop(&[getop_slot(b"s1", b"p", GetOpKind::Next, 3)]);
        assert_eq!(out[0].status, Status::Success);
        assert_eq!(
            subjects(&out[0]),
            vec![b"s1".to_vec(), b"s2".to_vec(), b"s3".to_vec()]
        );
    }

    #[test]
    fn partial_iteration_is_success() {
        let ds = seeded();
        let out = ds.bgetop(&[getop_slot(b"s2", b"p", GetOpKind::Next, 10)]);
        assert_eq!(out[0].status, Status::Success);
        assert_eq!(out[0].records.len(), 2);
    }

    #[test]
    fn prev_walks_backward() {
        let ds = seeded();
        let out = ds.bgetop(&[getop_slot(b"s3", b"p", GetOpKind::Prev, 2)]);
        assert_eq!(out[0].status, Status::Success);
        assert_eq!(subjects(&out[0]), vec![b"s3".to_vec(), b"s2".to_vec()]);
    }

    #[test]
    fn first_and_last_ignore_the_seek_key() {
        let ds = seeded();
        let first = ds.bgetop(&[getop_slot(b"zzz", b"zzz", GetOpKind::First, 1)]);
        assert_eq!(subjects(&first[0]), vec![b"s1".to_vec()]);

        let last = ds.bgetop(&[getop_slot(b"", b"", GetOpKind::Last, 1)]);
        assert_eq!(subjects(&last[0]), vec![b"s3".to_vec()]);
    }

    #[test]
    fn empty_walk_reports_the_seek_pair() {
        let ds = seeded();
        let out = ds.bgetop(&[getop_slot(b"zzz", b"p", GetOpKind::Next, 3)]);
        assert_eq!(out[0].status, Status::Error);
        assert_eq!(out[0].records.len(), 1);
        assert_eq!(out[0].records[0].subject.data(), b"zzz");
        assert!(out[0].records[0].object.is_none());
    }
}

mod histograms {
    use super::*;

    fn hist_datastore(names: &[&str], first_n: usize) -> Datastore {
        let histograms = names
            .iter()
            .map(|name| Histogram::new(*name, first_n, uniform(2)))
            .collect();
        Datastore::new(
            0,
            Box::new(InMemory::new("hist")),
            Callbacks::default_callbacks(),
            histograms,
            false,
            false,
        )
        .unwrap()
    }

    fn histogram_of(ds: &Datastore, name: &str) -> Option<Histogram> {
        let out = ds.bhistogram(&[HistogramRequestSlot {
            ds_offset: 0,
            token: 0,
            name: byte_blob(name.as_bytes()),
        }]);
        out.into_iter().next().and_then(|slot| slot.histogram)
    }

    #[test]
    fn numeric_puts_feed_the_matching_histogram() {
        let ds = hist_datastore(&["temperature", "pressure"], 10);

        ds.bput(&[
            put_slot(b"s1", b"temperature", Blob::from_f64(20.5)),
            put_slot(b"s2", b"temperature", Blob::from_i64(21)),
            put_slot(b"s3", b"pressure", Blob::from_f64(101.3)),
            // Non-numeric objects never touch histograms.
            put_slot(b"s4", b"temperature", byte_blob(b"cloudy")),
            // Predicates that name no histogram update nothing.
            put_slot(b"s5", b"humidity", Blob::from_f64(0.6)),
        ]);

        assert_eq!(histogram_of(&ds, "temperature").unwrap().total(), 2);
        assert_eq!(histogram_of(&ds, "pressure").unwrap().total(), 1);
        assert!(histogram_of(&ds, "humidity").is_none());
    }

    #[test]
    fn gets_and_deletes_do_not_touch_histograms() {
        let ds = hist_datastore(&["temperature"], 10);
        ds.bput(&[put_slot(b"s", b"temperature", Blob::from_f64(1.0))]);

        ds.bget(&[get_slot(b"s", b"temperature", DataType::Double)]);
        ds.bdelete(&[DeleteRequestSlot {
            ds_offset: 0,
            token: 0,
            subject: byte_blob(b"s"),
            predicate: byte_blob(b"temperature"),
        }]);

        assert_eq!(histogram_of(&ds, "temperature").unwrap().total(), 1);
    }

    #[test]
    fn histograms_persist_under_the_reserved_subject() {
        let ds = Datastore::new(
            0,
            Box::new(InMemory::new("persist")),
            Callbacks::default_callbacks(),
            vec![Histogram::new("temperature", 2, uniform(2))],
            false,
            true,
        )
        .unwrap();
        ds.bput(&[
            put_slot(b"s1", b"temperature", Blob::from_f64(1.0)),
            put_slot(b"s2", b"temperature", Blob::from_f64(3.0)),
        ]);
        ds.write_histograms().unwrap();

        // The snapshot is a regular record under the reserved subject.
        let gets = ds.bget(&[GetRequestSlot {
            ds_offset: 0,
            token: 0,
            subject: Blob::owned(HISTOGRAM_SUBJECT.to_vec(), DataType::Byte),
            predicate: byte_blob(b"temperature"),
            object_type: DataType::Byte,
        }]);
        assert_eq!(gets[0].status, Status::Success);

        let packed = gets[0].object.as_ref().unwrap();
        let mut cursor = blob::codec::Cursor::new(packed.bytes().clone());
        let reloaded = Histogram::unpack(&mut cursor, uniform(2)).unwrap();
        assert_eq!(reloaded.name(), "temperature");
        assert_eq!(reloaded.total(), 2);
        assert!(key_to_sp(&sp_to_key(HISTOGRAM_SUBJECT, b"temperature")).is_ok());
    }
}

#[cfg(feature = "rocksdb")]
mod rocks_backend {
    use super::*;
    use crate::rocks::RocksDb;

    #[test]
    fn put_get_scan_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let ds = Datastore::new(
            0,
            Box::new(RocksDb::open(dir.path().join("db"), true).unwrap()),
            Callbacks::default_callbacks(),
            Vec::new(),
            false,
            false,
        )
        .unwrap();

        ds.bput(&[
            put_slot(b"s1", b"p", byte_blob(b"o1")),
            put_slot(b"s2", b"p", byte_blob(b"o2")),
        ]);
        assert_eq!(ds.sync(), Status::Success);

        let gets = ds.bget(&[get_slot(b"s1", b"p", DataType::Byte)]);
        assert_eq!(gets[0].status, Status::Success);
        assert_eq!(gets[0].object.as_ref().unwrap().data(), b"o1");

        let scans = ds.bgetop(&[GetOpRequestSlot {
            ds_offset: 0,
            token: 0,
            kind: GetOpKind::First,
            subject: Blob::empty(DataType::Byte),
            predicate: Blob::empty(DataType::Byte),
            object_type: DataType::Byte,
            num_recs: 10,
        }]);
        assert_eq!(scans[0].records.len(), 2);
        ds.close();
        assert!(!ds.usable());
    }
}

mod dispatch {
    use super::*;

    fn range_server(datastore_count: usize) -> RangeServer {
        let datastores = (0..datastore_count)
            .map(|i| Arc::new(test_datastore(i as u32)))
            .collect();
        RangeServer::new(0, datastores)
    }

    #[test]
    fn slots_fan_out_by_offset_and_return_in_request_order() {
        let server = range_server(2);

        let mut bulk = Bulk::new(1, 0, 4);
        bulk.slots.push(PutRequestSlot {
            ds_offset: 1,
            token: 10,
            subject: byte_blob(b"s1"),
            predicate: byte_blob(b"p"),
            object: byte_blob(b"o1"),
        });
        bulk.slots.push(PutRequestSlot {
            ds_offset: 0,
            token: 11,
            subject: byte_blob(b"s2"),
            predicate: byte_blob(b"p"),
            object: byte_blob(b"o2"),
        });
        bulk.slots.push(PutRequestSlot {
            ds_offset: 1,
            token: 12,
            subject: byte_blob(b"s3"),
            predicate: byte_blob(b"p"),
            object: byte_blob(b"o3"),
        });

        let response = server.dispatch(&Request::Put(bulk));
        match response {
            Response::Put(bulk) => {
                assert_eq!(bulk.src, 0);
                assert_eq!(bulk.dst, 1);
                let tokens: Vec<u64> = bulk.slots.iter().map(|s| s.token).collect();
                assert_eq!(tokens, vec![10, 11, 12]);
                assert!(bulk.slots.iter().all(|s| s.status == Status::Success));
            }
            other => panic!("expected Put response, got {other:?}"),
        }

        // The writes really landed on different datastores.
        let ds0 = &server.datastores()[0];
        let ds1 = &server.datastores()[1];
        assert_eq!(
            ds0.bget(&[get_slot(b"s2", b"p", DataType::Byte)])[0].status,
            Status::Success
        );
        assert_eq!(
            ds1.bget(&[get_slot(b"s1", b"p", DataType::Byte)])[0].status,
            Status::Success
        );
        assert_eq!(
            ds0.bget(&[get_slot(b"s1", b"p", DataType::Byte)])[0].status,
            Status::Error
        );
    }

    #[test]
    fn response_counts_always_match_request_counts() {
        let server = range_server(1);

        let mut bulk = Bulk::new(1, 0, 4);
        for (i, subject) in [b"a", b"b", b"c"].iter().enumerate() {
            bulk.slots.push(GetRequestSlot {
                ds_offset: 0,
                token: i as u64,
                subject: byte_blob(*subject),
                predicate: byte_blob(b"p"),
                object_type: DataType::Byte,
            });
        }
        let request = Request::Get(bulk);
        let response = server.dispatch(&request);
        assert_eq!(response.count(), request.count());
    }

    #[test]
    fn unknown_offsets_fail_their_slots_only() {
        let server = range_server(1);

        let mut bulk = Bulk::new(1, 0, 2);
        bulk.slots.push(PutRequestSlot {
            ds_offset: 7,
            token: 1,
            subject: byte_blob(b"s1"),
            predicate: byte_blob(b"p"),
            object: byte_blob(b"o"),
        });
        bulk.slots.push(PutRequestSlot {
            ds_offset: 0,
            token: 2,
            subject: byte_blob(b"s2"),
            predicate: byte_blob(b"p"),
            object: byte_blob(b"o"),
        });

        match server.dispatch(&Request::Put(bulk)) {
            Response::Put(bulk) => {
                assert_eq!(bulk.slots[0].status, Status::Error);
                assert_eq!(bulk.slots[1].status, Status::Success);
            }
            other => panic!("expected Put response, got {other:?}"),
        }
    }
}
