// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::sync::Arc;

use bytes::Bytes;

use blob::codec::Cursor;

use crate::{uniform, BucketGenerator, Histogram};

fn single_bucket_at(bound: f64) -> BucketGenerator {
    Arc::new(move |_cache: &[f64]| Ok(vec![bound]))
}

#[test]
fn fills_then_commits_at_first_n() {
    let mut hist = Histogram::new("latency", 3, single_bucket_at(0.0));

    hist.add(1.0);
    hist.add(2.0);
    assert!(!hist.is_committed());
    assert_eq!(hist.cache(), (3, &[1.0, 2.0][..]));
    assert_eq!(hist.get(), None);

    // The third sample freezes the buckets and replays the cache.
    hist.add(3.0);
    assert!(hist.is_committed());
    assert_eq!(hist.cache().1, &[] as &[f64]);
    let (buckets, counts) = hist.get().unwrap();
    assert_eq!(buckets, &[0.0]);
    assert_eq!(counts, &[3]);
}

#[test]
fn committed_adds_pick_the_greatest_lower_bound() {
    let mut hist = Histogram::new(
        "latency",
        1,
        Arc::new(|_| Ok(vec![0.0, 10.0, 20.0])),
    );
    hist.add(15.0); // commits, then lands in [10, 20)

    hist.add(0.0);
    hist.add(9.9);
    hist.add(10.0);
    hist.add(25.0);

    let (_, counts) = hist.get().unwrap();
    assert_eq!(counts, &[2, 2, 1]);
}

#[test]
fn values_below_the_first_bucket_land_in_bucket_zero() {
    let mut hist = Histogram::new("latency", 1, Arc::new(|_| Ok(vec![100.0, 200.0])));
    hist.add(150.0);
    hist.add(-5.0);
    hist.add(0.0);

    let (_, counts) = hist.get().unwrap();
    assert_eq!(counts, &[3, 0]);
}

#[test]
fn count_conservation_across_the_commit() {
    let mut hist = Histogram::new("latency", 5, uniform(4));
    for i in 0..17 {
        hist.add(i as f64);
        assert_eq!(hist.total(), i as u64 + 1);
    }
    let (_, counts) = hist.get().unwrap();
    assert_eq!(counts.iter().sum::<u64>(), 17);
}

#[test]
fn generator_failure_keeps_filling() {
    let mut hist = Histogram::new("latency", 2, Arc::new(|_| Err("nope".to_owned())));
    hist.add(1.0);
    hist.add(2.0);
    assert!(!hist.is_committed());
    // The cache keeps growing past first-N and retries each time.
    hist.add(3.0);
    assert!(!hist.is_committed());
    assert_eq!(hist.total(), 3);
}

#[test]
fn uniform_generator_spans_min_to_max() {
    let generator = uniform(4);
    let buckets = generator(&[0.0, 100.0, 50.0]).unwrap();
    assert_eq!(buckets, vec![0.0, 25.0, 50.0, 75.0]);

    // A degenerate cache still produces the requested bucket count.
    let buckets = generator(&[7.0, 7.0]).unwrap();
    assert_eq!(buckets.len(), 4);
    assert_eq!(buckets[0], 7.0);

    assert!(generator(&[]).is_err());
    assert!(uniform(0)(&[1.0]).is_err());
}

#[test]
fn pack_round_trips_while_filling() {
    let mut hist = Histogram::new("latency", 4, uniform(2));
    hist.add(1.5);
    hist.add(-2.5);

    let mut buf = Vec::new();
    hist.pack(&mut buf);
    assert_eq!(buf.len(), hist.packed_size());

    let mut cursor = Cursor::new(Bytes::from(buf));
    let unpacked = Histogram::unpack(&mut cursor, uniform(2)).unwrap();
    assert_eq!(unpacked, hist);
    assert_eq!(cursor.remaining(), 0);
}

#[test]
fn pack_round_trips_when_committed() {
    let mut hist = Histogram::new("latency", 2, uniform(3));
    hist.add(0.0);
    hist.add(30.0);
    hist.add(12.0);
    assert!(hist.is_committed());

    let mut buf = Vec::new();
    hist.pack(&mut buf);

    let mut cursor = Cursor::new(Bytes::from(buf));
    let unpacked = Histogram::unpack(&mut cursor, uniform(3)).unwrap();
    assert_eq!(unpacked, hist);

    // A reloaded histogram keeps counting where it left off.
    let mut reloaded = unpacked;
    reloaded.add(1000.0);
    assert_eq!(reloaded.total(), hist.total() + 1);
}

#[test]
fn unpack_rejects_unknown_state() {
    let mut buf = Vec::new();
    blob::codec::put_u64(&mut buf, 1);
    buf.extend_from_slice(b"h");
    blob::codec::put_u8(&mut buf, 9); // not a state
    blob::codec::put_u64(&mut buf, 4);

    let mut cursor = Cursor::new(Bytes::from(buf));
    assert!(Histogram::unpack(&mut cursor, uniform(2)).is_err());
}
