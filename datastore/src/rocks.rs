// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::path::{Path, PathBuf};

use rocksdb::{Options, WriteBatch, DB};

use crate::backend::{Backend, ScanDirection, ScanOrigin};

///
/// The RocksDB backend. Key order is plain memcmp over the packed keys, so
/// no custom comparator is configured; the transform layer already makes
/// byte order match numeric order.
///
pub struct RocksDb {
    path: PathBuf,
    db: Option<DB>,
}

impl RocksDb {
    pub fn open<P: AsRef<Path>>(path: P, create_if_missing: bool) -> Result<RocksDb, String> {
        let path = path.as_ref().to_path_buf();
        let mut options = Options::default();
        options.create_if_missing(create_if_missing);
        let db = DB::open(&options, &path)
            .map_err(|e| format!("failed to open rocksdb at {path:?}: {e}"))?;
        log::info!("Opened rocksdb at {path:?}");
        Ok(RocksDb {
            path,
            db: Some(db),
        })
    }

    fn db(&self) -> Result<&DB, String> {
        self.db
            .as_ref()
            .ok_or_else(|| format!("rocksdb at {:?} is closed", self.path))
    }
}

impl Backend for RocksDb {
    fn name(&self) -> &str {
        self.path.to_str().unwrap_or("<non-utf8 path>")
    }

    fn usable(&self) -> bool {
        self.db.is_some()
    }

    fn put_batch(&mut self, items: &[(Vec<u8>, Vec<u8>)]) -> Result<(), String> {
        let db = self.db()?;
        let mut batch = WriteBatch::default();
        for (key, value) in items {
            batch.put(key, value);
        }
        db.write(batch)
            .map_err(|e| format!("rocksdb batch write failed: {e}"))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, String> {
        self.db()?
            .get(key)
            .map_err(|e| format!("rocksdb get failed: {e}"))
    }

    fn delete_batch(&mut self, keys: &[Vec<u8>]) -> Result<(), String> {
        let db = self.db()?;
        let mut batch = WriteBatch::default();
        for key in keys {
            batch.delete(key);
        }
        db.write(batch)
            .map_err(|e| format!("rocksdb batch delete failed: {e}"))
    }

    fn scan(
        &self,
        origin: ScanOrigin<'_>,
        direction: ScanDirection,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, String> {
        let db = self.db()?;
        let mut iter = db.raw_iterator();
        match origin {
            ScanOrigin::Key(key) => iter.seek(key),
            ScanOrigin::First => iter.seek_to_first(),
            ScanOrigin::Last => iter.seek_to_last(),
        }

        let mut records = Vec::new();
        while iter.valid() && records.len() < limit {
            match (iter.key(), iter.value()) {
                (Some(key), Some(value)) => records.push((key.to_vec(), value.to_vec())),
                _ => break,
            }
            match direction {
                ScanDirection::Forward => iter.next(),
                ScanDirection::Backward => iter.prev(),
            }
        }
        iter.status()
            .map_err(|e| format!("rocksdb iteration failed: {e}"))?;
        Ok(records)
    }

    fn sync(&mut self) -> Result<(), String> {
        self.db()?
            .flush()
            .map_err(|e| format!("rocksdb flush failed: {e}"))
    }

    fn close(&mut self) {
        self.db = None;
    }
}
