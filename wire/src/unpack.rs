// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The reading half of the codec. See `pack.rs` for the field sequences.

use blob::codec::Cursor;
use blob::{Blob, DataType};
use bytes::Bytes;
use histogram::Histogram;

use crate::{
    Bulk, DeleteRequestSlot, DeleteResponseSlot, Direction, GetOpKind, GetOpRecord,
    GetOpRequestSlot, GetOpResponseSlot, GetRequestSlot, GetResponseSlot, HistogramRequestSlot,
    HistogramResponseSlot, Op, PackError, PutRequestSlot, PutResponseSlot, Request, Response,
    Status,
};

struct Header {
    op: Op,
    src: u32,
    dst: u32,
    count: usize,
    ds_offsets: Vec<u32>,
}

fn unpack_header(cursor: &mut Cursor, expected: Direction) -> Result<Header, PackError> {
    let direction_tag = cursor.get_u8()?;
    let direction = Direction::try_from(direction_tag).map_err(|_| PackError::BadTag(direction_tag))?;
    if direction != expected {
        return Err(PackError::BadTag(direction_tag));
    }

    let op_tag = cursor.get_u8()?;
    let op = Op::try_from(op_tag).map_err(|_| PackError::BadTag(op_tag))?;

    let src = cursor.get_u32()?;
    let dst = cursor.get_u32()?;
    let count = cursor.get_u64()? as usize;

    let mut ds_offsets = Vec::with_capacity(count);
    for _ in 0..count {
        ds_offsets.push(cursor.get_u32()?);
    }

    Ok(Header {
        op,
        src,
        dst,
        count,
        ds_offsets,
    })
}

fn get_data_type(cursor: &mut Cursor) -> Result<DataType, PackError> {
    let tag = cursor.get_u8()?;
    DataType::try_from(tag).map_err(|_| PackError::BadTag(tag))
}

fn get_status(cursor: &mut Cursor) -> Result<Status, PackError> {
    let tag = cursor.get_u8()?;
    Status::try_from(tag).map_err(|_| PackError::BadTag(tag))
}

fn get_getop_kind(cursor: &mut Cursor) -> Result<GetOpKind, PackError> {
    let tag = cursor.get_u8()?;
    GetOpKind::try_from(tag).map_err(|_| PackError::BadTag(tag))
}

impl Request {
    pub fn unpack(data: Bytes) -> Result<Request, PackError> {
        let mut cursor = Cursor::new(data);
        let header = unpack_header(&mut cursor, Direction::Request)?;

        match header.op {
            Op::Put => {
                let mut bulk = Bulk::new(header.src, header.dst, header.count);
                for ds_offset in header.ds_offsets {
                    let subject = Blob::unpack(&mut cursor, DataType::Byte)?;
                    let predicate = Blob::unpack(&mut cursor, DataType::Byte)?;
                    let token = cursor.get_u64()?;
                    let object_type = get_data_type(&mut cursor)?;
                    let object = Blob::unpack(&mut cursor, object_type)?;
                    bulk.slots.push(PutRequestSlot {
                        ds_offset,
                        token,
                        subject,
                        predicate,
                        object,
                    });
                }
                Ok(Request::Put(bulk))
            }
            Op::Get => {
                let mut bulk = Bulk::new(header.src, header.dst, header.count);
                for ds_offset in header.ds_offsets {
                    let subject = Blob::unpack(&mut cursor, DataType::Byte)?;
                    let predicate = Blob::unpack(&mut cursor, DataType::Byte)?;
                    let token = cursor.get_u64()?;
                    let object_type = get_data_type(&mut cursor)?;
                    bulk.slots.push(GetRequestSlot {
                        ds_offset,
                        token,
                        subject,
                        predicate,
                        object_type,
                    });
                }
                Ok(Request::Get(bulk))
            }
            Op::GetOp => {
                let mut bulk = Bulk::new(header.src, header.dst, header.count);
                for ds_offset in header.ds_offsets {
                    let kind = get_getop_kind(&mut cursor)?;
                    let (subject, predicate) = if kind.has_seek_key() {
                        (
                            Blob::unpack(&mut cursor, DataType::Byte)?,
                            Blob::unpack(&mut cursor, DataType::Byte)?,
                        )
                    } else {
                        (Blob::empty(DataType::Byte), Blob::empty(DataType::Byte))
                    };
                    let token = cursor.get_u64()?;
                    let object_type = get_data_type(&mut cursor)?;
                    let num_recs = cursor.get_u64()?;
                    bulk.slots.push(GetOpRequestSlot {
                        ds_offset,
                        token,
                        kind,
                        subject,
                        predicate,
                        object_type,
                        num_recs,
                    });
                }
                Ok(Request::GetOp(bulk))
            }
            Op::Delete => {
                let mut bulk = Bulk::new(header.src, header.dst, header.count);
                for ds_offset in header.ds_offsets {
                    let subject = Blob::unpack(&mut cursor, DataType::Byte)?;
                    let predicate = Blob::unpack(&mut cursor, DataType::Byte)?;
                    let token = cursor.get_u64()?;
                    bulk.slots.push(DeleteRequestSlot {
                        ds_offset,
                        token,
                        subject,
                        predicate,
                    });
                }
                Ok(Request::Delete(bulk))
            }
            Op::Histogram => {
                let mut bulk = Bulk::new(header.src, header.dst, header.count);
                for ds_offset in header.ds_offsets {
                    let name = Blob::unpack(&mut cursor, DataType::Byte)?;
                    let token = cursor.get_u64()?;
                    bulk.slots.push(HistogramRequestSlot {
                        ds_offset,
                        token,
                        name,
                    });
                }
                Ok(Request::Histogram(bulk))
            }
            // Sync never travels as a bulk message.
            Op::Sync => Err(PackError::BadTag(Op::Sync.into())),
        }
    }
}

impl Response {
    pub fn unpack(data: Bytes) -> Result<Response, PackError> {
        let mut cursor = Cursor::new(data);
        let header = unpack_header(&mut cursor, Direction::Response)?;

        match header.op {
            Op::Put => {
                let mut bulk = Bulk::new(header.src, header.dst, header.count);
                for ds_offset in header.ds_offsets {
                    let token = cursor.get_u64()?;
                    let status = get_status(&mut cursor)?;
                    bulk.slots.push(PutResponseSlot {
                        ds_offset,
                        token,
                        status,
                    });
                }
                Ok(Response::Put(bulk))
            }
            Op::Get => {
                let mut bulk = Bulk::new(header.src, header.dst, header.count);
                for ds_offset in header.ds_offsets {
                    let token = cursor.get_u64()?;
                    let status = get_status(&mut cursor)?;
                    let object_type = get_data_type(&mut cursor)?;
                    let object = if status == Status::Success {
                        Some(Blob::unpack(&mut cursor, object_type)?)
                    } else {
                        None
                    };
                    bulk.slots.push(GetResponseSlot {
                        ds_offset,
                        token,
                        status,
                        object_type,
                        object,
                    });
                }
                Ok(Response::Get(bulk))
            }
            Op::GetOp => {
                let mut bulk = Bulk::new(header.src, header.dst, header.count);
                for ds_offset in header.ds_offsets {
                    let token = cursor.get_u64()?;
                    let status = get_status(&mut cursor)?;
                    let object_type = get_data_type(&mut cursor)?;
                    let num_recs = cursor.get_u64()? as usize;
                    let mut records = Vec::with_capacity(num_recs);
                    for _ in 0..num_recs {
                        let subject = Blob::unpack(&mut cursor, DataType::Byte)?;
                        let predicate = Blob::unpack(&mut cursor, DataType::Byte)?;
                        let object = if status == Status::Success {
                            Some(Blob::unpack(&mut cursor, object_type)?)
                        } else {
                            None
                        };
                        records.push(GetOpRecord {
                            subject,
                            predicate,
                            object,
                        });
                    }
                    bulk.slots.push(GetOpResponseSlot {
                        ds_offset,
                        token,
                        status,
                        object_type,
                        records,
                    });
                }
                Ok(Response::GetOp(bulk))
            }
            Op::Delete => {
                let mut bulk = Bulk::new(header.src, header.dst, header.count);
                for ds_offset in header.ds_offsets {
                    let token = cursor.get_u64()?;
                    let status = get_status(&mut cursor)?;
                    bulk.slots.push(DeleteResponseSlot {
                        ds_offset,
                        token,
                        status,
                    });
                }
                Ok(Response::Delete(bulk))
            }
            Op::Histogram => {
                let mut bulk = Bulk::new(header.src, header.dst, header.count);
                for ds_offset in header.ds_offsets {
                    let token = cursor.get_u64()?;
                    let status = get_status(&mut cursor)?;
                    let histogram = if status == Status::Success {
                        Some(Histogram::unpack(&mut cursor, histogram::uniform(10))?)
                    } else {
                        None
                    };
                    bulk.slots.push(HistogramResponseSlot {
                        ds_offset,
                        token,
                        status,
                        histogram,
                    });
                }
                Ok(Response::Histogram(bulk))
            }
            // Sync never travels as a bulk message.
            Op::Sync => Err(PackError::BadTag(Op::Sync.into())),
        }
    }
}
