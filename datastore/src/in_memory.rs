// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::backend::{Backend, ScanDirection, ScanOrigin};

///
/// The ordered-map backend. Nothing persists; `sync` is a no-op. Useful as
/// the reference implementation of the scan contract and for every test
/// that does not need a disk.
///
pub struct InMemory {
    name: String,
    map: BTreeMap<Vec<u8>, Vec<u8>>,
    usable: bool,
}

impl InMemory {
    pub fn new<S: Into<String>>(name: S) -> InMemory {
        InMemory {
            name: name.into(),
            map: BTreeMap::new(),
            usable: true,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// The key the origin lands on, emulating a storage engine seek: the
    /// first key >= the target.
    fn landing(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.map
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
            .next()
            .map(|(k, _)| k.clone())
    }
}

fn collect_limited<'a, I>(iter: I, limit: usize) -> Vec<(Vec<u8>, Vec<u8>)>
where
    I: Iterator<Item = (&'a Vec<u8>, &'a Vec<u8>)>,
{
    iter.take(limit)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

impl Backend for InMemory {
    fn name(&self) -> &str {
        &self.name
    }

    fn usable(&self) -> bool {
        self.usable
    }

    fn put_batch(&mut self, items: &[(Vec<u8>, Vec<u8>)]) -> Result<(), String> {
        if !self.usable {
            return Err(format!("in-memory store {:?} is closed", self.name));
        }
        for (key, value) in items {
            self.map.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, String> {
        if !self.usable {
            return Err(format!("in-memory store {:?} is closed", self.name));
        }
        Ok(self.map.get(key).cloned())
    }

    fn delete_batch(&mut self, keys: &[Vec<u8>]) -> Result<(), String> {
        if !self.usable {
            return Err(format!("in-memory store {:?} is closed", self.name));
        }
        for key in keys {
            self.map.remove(key);
        }
        Ok(())
    }

    fn scan(
        &self,
        origin: ScanOrigin<'_>,
        direction: ScanDirection,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, String> {
        if !self.usable {
            return Err(format!("in-memory store {:?} is closed", self.name));
        }

        let records = match (origin, direction) {
            (ScanOrigin::First, _) => collect_limited(self.map.iter(), limit),
            (ScanOrigin::Last, _) => collect_limited(self.map.iter().rev(), limit),
            (ScanOrigin::Key(key), ScanDirection::Forward) => collect_limited(
                self.map
                    .range::<[u8], _>((Bound::Included(key), Bound::Unbounded)),
                limit,
            ),
            (ScanOrigin::Key(key), ScanDirection::Backward) => {
                // A backward walk still seeks forward first: if nothing is
                // at or after the key, the iterator is invalid and the scan
                // is empty.
                match self.landing(key) {
                    Some(landed) => collect_limited(
                        self.map
                            .range::<[u8], _>((Bound::Unbounded, Bound::Included(&landed[..])))
                            .rev(),
                        limit,
                    ),
                    None => Vec::new(),
                }
            }
        };
        Ok(records)
    }

    fn sync(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn close(&mut self) {
        self.map.clear();
        self.usable = false;
    }
}
