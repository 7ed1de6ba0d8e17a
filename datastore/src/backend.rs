// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

/// Where an iteration starts.
#[derive(Clone, Copy, Debug)]
pub enum ScanOrigin<'a> {
    /// Seek: position at the first key >= this one. An empty scan result
    /// means the position was past the end.
    Key(&'a [u8]),
    First,
    Last,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanDirection {
    Forward,
    Backward,
}

///
/// The storage engine under one datastore. Implementations are plain
/// single-threaded state machines; the owning `Datastore` serializes every
/// call under its mutex.
///
/// Writes are batched: `put_batch` and `delete_batch` commit atomically or
/// fail as a whole, which is what lets the dispatch layer rewrite
/// still-unset slot statuses after the commit resolves.
///
pub trait Backend: Send {
    fn name(&self) -> &str;

    /// False once `close` has run, or if construction half-failed.
    fn usable(&self) -> bool;

    fn put_batch(&mut self, items: &[(Vec<u8>, Vec<u8>)]) -> Result<(), String>;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, String>;

    /// Deleting a key that is not present is not an error.
    fn delete_batch(&mut self, keys: &[Vec<u8>]) -> Result<(), String>;

    /// Walk up to `limit` records from the origin in the given direction,
    /// including the record the origin lands on. Running out of records
    /// before `limit` is not an error; the result is just shorter.
    fn scan(
        &self,
        origin: ScanOrigin<'_>,
        direction: ScanDirection,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, String>;

    fn sync(&mut self) -> Result<(), String>;

    fn close(&mut self);
}
