// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Order-preserving payload encoding.
//!
//! Backends compare keys with memcmp, so every numeric payload is rewritten
//! before storage so that byte-wise order equals numeric order:
//!
//! * integers: big-endian, with the sign bit flipped for signed types so
//!   negative values sort below positive ones;
//! * floats: the IEEE 754 bit pattern, sign-extended so that the sign,
//!   exponent, and mantissa compare lexicographically in numeric order
//!   (negative values have all bits inverted, positive values have the
//!   sign bit set);
//! * byte, pointer, and tracked payloads pass through verbatim.
//!
//! Every encoding decodes back to the exact input bytes.

use std::collections::HashMap;

use blob::DataType;

pub type EncodeFn = fn(&[u8]) -> Result<Vec<u8>, String>;
pub type DecodeFn = fn(&[u8]) -> Result<Vec<u8>, String>;

fn fixed<const N: usize>(raw: &[u8], data_type: DataType) -> Result<[u8; N], String> {
    raw.try_into()
        .map_err(|_| format!("{data_type} payload must be {N} bytes, got {}", raw.len()))
}

fn encode_i32(raw: &[u8]) -> Result<Vec<u8>, String> {
    let value = i32::from_le_bytes(fixed(raw, DataType::Int32)?);
    Ok(((value as u32) ^ 0x8000_0000).to_be_bytes().to_vec())
}

fn decode_i32(stored: &[u8]) -> Result<Vec<u8>, String> {
    let bits = u32::from_be_bytes(fixed(stored, DataType::Int32)?) ^ 0x8000_0000;
    Ok((bits as i32).to_le_bytes().to_vec())
}

fn encode_i64(raw: &[u8]) -> Result<Vec<u8>, String> {
    let value = i64::from_le_bytes(fixed(raw, DataType::Int64)?);
    Ok(((value as u64) ^ 0x8000_0000_0000_0000)
        .to_be_bytes()
        .to_vec())
}

fn decode_i64(stored: &[u8]) -> Result<Vec<u8>, String> {
    let bits = u64::from_be_bytes(fixed(stored, DataType::Int64)?) ^ 0x8000_0000_0000_0000;
    Ok((bits as i64).to_le_bytes().to_vec())
}

fn encode_u32(raw: &[u8]) -> Result<Vec<u8>, String> {
    let value = u32::from_le_bytes(fixed(raw, DataType::UInt32)?);
    Ok(value.to_be_bytes().to_vec())
}

fn decode_u32(stored: &[u8]) -> Result<Vec<u8>, String> {
    let value = u32::from_be_bytes(fixed(stored, DataType::UInt32)?);
    Ok(value.to_le_bytes().to_vec())
}

fn encode_u64(raw: &[u8]) -> Result<Vec<u8>, String> {
    let value = u64::from_le_bytes(fixed(raw, DataType::UInt64)?);
    Ok(value.to_be_bytes().to_vec())
}

fn decode_u64(stored: &[u8]) -> Result<Vec<u8>, String> {
    let value = u64::from_be_bytes(fixed(stored, DataType::UInt64)?);
    Ok(value.to_le_bytes().to_vec())
}

fn encode_f32(raw: &[u8]) -> Result<Vec<u8>, String> {
    let bits = f32::from_le_bytes(fixed(raw, DataType::Float)?).to_bits();
    let ordered = if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    };
    Ok(ordered.to_be_bytes().to_vec())
}

fn decode_f32(stored: &[u8]) -> Result<Vec<u8>, String> {
    let ordered = u32::from_be_bytes(fixed(stored, DataType::Float)?);
    let bits = if ordered & 0x8000_0000 != 0 {
        ordered & !0x8000_0000
    } else {
        !ordered
    };
    Ok(f32::from_bits(bits).to_le_bytes().to_vec())
}

fn encode_f64(raw: &[u8]) -> Result<Vec<u8>, String> {
    let bits = f64::from_le_bytes(fixed(raw, DataType::Double)?).to_bits();
    let ordered = if bits & 0x8000_0000_0000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000_0000_0000
    };
    Ok(ordered.to_be_bytes().to_vec())
}

fn decode_f64(stored: &[u8]) -> Result<Vec<u8>, String> {
    let ordered = u64::from_be_bytes(fixed(stored, DataType::Double)?);
    let bits = if ordered & 0x8000_0000_0000_0000 != 0 {
        ordered & !0x8000_0000_0000_0000
    } else {
        !ordered
    };
    Ok(f64::from_bits(bits).to_le_bytes().to_vec())
}

fn passthrough(raw: &[u8]) -> Result<Vec<u8>, String> {
    Ok(raw.to_vec())
}

///
/// The per-type encode/decode table. The defaults cover every DataType;
/// deployments may override individual entries (e.g. a custom collation for
/// byte payloads) before datastores are constructed.
///
#[derive(Clone)]
pub struct Callbacks {
    encode: HashMap<DataType, EncodeFn>,
    decode: HashMap<DataType, DecodeFn>,
}

impl Callbacks {
    pub fn default_callbacks() -> Callbacks {
        let mut callbacks = Callbacks {
            encode: HashMap::new(),
            decode: HashMap::new(),
        };
        for data_type in [DataType::Byte, DataType::Pointer, DataType::Tracked] {
            callbacks.set(data_type, passthrough, passthrough);
        }
        callbacks.set(DataType::Int32, encode_i32, decode_i32);
        callbacks.set(DataType::Int64, encode_i64, decode_i64);
        callbacks.set(DataType::UInt32, encode_u32, decode_u32);
        callbacks.set(DataType::UInt64, encode_u64, decode_u64);
        callbacks.set(DataType::Float, encode_f32, decode_f32);
        callbacks.set(DataType::Double, encode_f64, decode_f64);
        callbacks
    }

    pub fn set(&mut self, data_type: DataType, encode: EncodeFn, decode: DecodeFn) {
        self.encode.insert(data_type, encode);
        self.decode.insert(data_type, decode);
    }

    pub fn encode(&self, data_type: DataType, raw: &[u8]) -> Result<Vec<u8>, String> {
        match self.encode.get(&data_type) {
            Some(encode) => encode(raw),
            None => passthrough(raw),
        }
    }

    pub fn decode(&self, data_type: DataType, stored: &[u8]) -> Result<Vec<u8>, String> {
        match self.decode.get(&data_type) {
            Some(decode) => decode(stored),
            None => passthrough(stored),
        }
    }
}
