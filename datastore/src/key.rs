// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The packed key materialized on the wire and in every backend:
//!
//! ```text
//! key := subject_bytes || subject_len (8 bytes, big-endian)
//!     || predicate_bytes || predicate_len (8 bytes, big-endian)
//! ```
//!
//! Values lead and lengths trail, so byte-wise key order groups by subject
//! first with predicate as tiebreaker, and a key is split by reading it in
//! reverse: predicate length, then subject length, then both values.

use blob::codec::LEN_WIDTH;

pub fn key_size(subject: &[u8], predicate: &[u8]) -> usize {
    subject.len() + predicate.len() + 2 * LEN_WIDTH
}

pub fn sp_to_key(subject: &[u8], predicate: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(key_size(subject, predicate));
    key.extend_from_slice(subject);
    key.extend_from_slice(&(subject.len() as u64).to_be_bytes());
    key.extend_from_slice(predicate);
    key.extend_from_slice(&(predicate.len() as u64).to_be_bytes());
    key
}

/// Split a packed key back into its (subject, predicate) views.
pub fn key_to_sp(key: &[u8]) -> Result<(&[u8], &[u8]), String> {
    if key.len() < 2 * LEN_WIDTH {
        return Err(format!("key of {} bytes is too short to split", key.len()));
    }

    let mut raw = [0_u8; LEN_WIDTH];

    raw.copy_from_slice(&key[key.len() - LEN_WIDTH..]);
    let predicate_len = u64::from_be_bytes(raw) as usize;

    let predicate_end = key.len() - LEN_WIDTH;
    let subject_field_end = predicate_end
        .checked_sub(predicate_len)
        .ok_or_else(|| format!("predicate length {predicate_len} overruns the key"))?;
    let subject_end = subject_field_end
        .checked_sub(LEN_WIDTH)
        .ok_or_else(|| format!("predicate length {predicate_len} overruns the key"))?;

    raw.copy_from_slice(&key[subject_end..subject_field_end]);
    let subject_len = u64::from_be_bytes(raw) as usize;

    if subject_len != subject_end {
        return Err(format!(
            "subject length {subject_len} does not match the {subject_end} bytes before it"
        ));
    }

    Ok((&key[..subject_end], &key[subject_field_end..predicate_end]))
}
