// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use bytes::Bytes;

use crate::codec::{Cursor, PackError};
use crate::{Blob, DataType};

#[test]
fn owned_and_reference_are_bytewise_equal() {
    let backing = Bytes::from_static(b"payload");
    let owned = Blob::owned(b"payload".to_vec(), DataType::Byte);
    let referenced = Blob::reference(backing, DataType::Byte);
    assert_eq!(owned, referenced);
    assert_eq!(owned.len(), 7);
    assert_eq!(owned.data(), b"payload");
}

#[test]
fn empty_blob_has_no_data() {
    let blob = Blob::empty(DataType::Byte);
    assert!(blob.is_empty());
    assert_eq!(blob.len(), 0);
    assert_eq!(blob.data(), b"");
}

#[test]
fn pack_round_trips_without_copying() {
    let blob = Blob::owned(b"subject".to_vec(), DataType::Byte);
    let mut buf = Vec::new();
    blob.pack(&mut buf);
    assert_eq!(buf.len(), blob.pack_size());

    let mut cursor = Cursor::new(Bytes::from(buf));
    let unpacked = Blob::unpack(&mut cursor, DataType::Byte).unwrap();
    assert_eq!(unpacked, blob);
    assert_eq!(cursor.remaining(), 0);
}

#[test]
fn unpack_fails_on_short_buffer() {
    let blob = Blob::owned(b"subject".to_vec(), DataType::Byte);
    let mut buf = Vec::new();
    blob.pack(&mut buf);
    buf.truncate(buf.len() - 1);

    let mut cursor = Cursor::new(Bytes::from(buf));
    match Blob::unpack(&mut cursor, DataType::Byte) {
        Err(PackError::ShortBuffer { .. }) => (),
        other => panic!("expected ShortBuffer, got {other:?}"),
    }
}

#[test]
fn numeric_constructors_round_trip() {
    assert_eq!(Blob::from_i32(-42).as_i32(), Some(-42));
    assert_eq!(Blob::from_i64(1 << 40).as_i64(), Some(1 << 40));
    assert_eq!(Blob::from_u32(7).as_u32(), Some(7));
    assert_eq!(Blob::from_u64(u64::MAX).as_u64(), Some(u64::MAX));
    assert_eq!(Blob::from_f32(1.5).as_f32(), Some(1.5));
    assert_eq!(Blob::from_f64(-2.25).as_f64(), Some(-2.25));
}

#[test]
fn numeric_value_follows_the_type_tag() {
    assert_eq!(Blob::from_i64(-3).numeric_value(), Some(-3.0));
    assert_eq!(Blob::from_f32(0.5).numeric_value(), Some(0.5));
    assert_eq!(
        Blob::owned(b"not a number".to_vec(), DataType::Byte).numeric_value(),
        None
    );
    // A numeric tag over a payload of the wrong width is not a value.
    assert_eq!(
        Blob::owned(b"abc".to_vec(), DataType::Int32)
            .numeric_value(),
        None
    );
}

#[test]
fn data_type_tags_round_trip_through_u8() {
    for tag in 0_u8..=8 {
        let data_type = DataType::try_from(tag).unwrap();
        assert_eq!(u8::from(data_type), tag);
    }
    assert!(DataType::try_from(9_u8).is_err());
}

#[test]
fn cursor_reads_are_positional() {
    let mut buf = Vec::new();
    crate::codec::put_u8(&mut buf, 0xab);
    crate::codec::put_u32(&mut buf, 0xdead_beef);
    crate::codec::put_u64(&mut buf, 42);
    crate::codec::put_f64(&mut buf, -1.25);

    let mut cursor = Cursor::new(Bytes::from(buf));
    assert_eq!(cursor.get_u8().unwrap(), 0xab);
    assert_eq!(cursor.get_u32().unwrap(), 0xdead_beef);
    assert_eq!(cursor.get_u64().unwrap(), 42);
    assert_eq!(cursor.get_f64().unwrap(), -1.25);
    assert_eq!(cursor.remaining(), 0);
    assert!(matches!(
        cursor.get_u8(),
        Err(PackError::ShortBuffer { .. })
    ));
}
