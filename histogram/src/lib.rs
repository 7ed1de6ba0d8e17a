// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

// Enable all clippy lints except for many of the pedantic ones. It's a shame this needs to be copied and pasted across crates, but there doesn't appear to be a way to include inner attributes from a common source.
#![deny(
    clippy::all,
    clippy::default_trait_access,
    clippy::expl_impl_clone_on_copy,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::unseparated_literal_suffix,
    clippy::used_underscore_binding
)]
// It is often more clear to show that nothing is being moved.
#![allow(clippy::match_ref_pats)]
// Subjective style.
#![allow(
    clippy::len_without_is_empty,
    clippy::redundant_field_names,
    clippy::too_many_arguments
)]
// Default isn't as big a deal as people seem to think it is.
#![allow(clippy::new_without_default, clippy::new_ret_no_self)]
// Arc<Mutex> can be more clear than needing to grok Orderings:
#![allow(clippy::mutex_atomic)]

use std::fmt;
use std::sync::Arc;

use blob::codec::{self, Cursor, PackError};

///
/// Produces the final bucket lower bounds from the first N observed samples.
/// The returned bounds must be sorted ascending; generation may fail, in
/// which case the histogram keeps filling and tries again on the next add.
///
pub type BucketGenerator = Arc<dyn Fn(&[f64]) -> Result<Vec<f64>, String> + Send + Sync>;

/// `count` equal-width buckets spanning the min and max of the cached
/// samples. A degenerate cache (min == max) still yields `count` buckets.
pub fn uniform(count: usize) -> BucketGenerator {
    Arc::new(move |cache: &[f64]| {
        if count == 0 {
            return Err("cannot generate 0 buckets".to_owned());
        }
        if cache.is_empty() {
            return Err("cannot generate buckets from an empty cache".to_owned());
        }
        let min = cache.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = cache.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let width = if max > min {
            (max - min) / count as f64
        } else {
            1.0
        };
        Ok((0..count).map(|i| min + width * i as f64).collect())
    })
}

const STATE_FILLING: u8 = 0;
const STATE_COMMITTED: u8 = 1;

///
/// A named streaming bucket-count estimator.
///
/// Two states: *filling* keeps every sample verbatim in a first-N cache;
/// once the cache reaches N, the generator freezes the bucket set and the
/// cached samples are replayed into it (*committed*). Committed adds land in
/// the bucket whose lower bound is the greatest value <= the sample; values
/// below the first bound land in bucket 0.
///
#[derive(Clone)]
pub struct Histogram {
    name: String,
    first_n: usize,
    cache: Vec<f64>,
    generator: BucketGenerator,
    buckets: Vec<f64>,
    counts: Vec<u64>,
    committed: bool,
}

impl Histogram {
    pub fn new<S: Into<String>>(name: S, first_n: usize, generator: BucketGenerator) -> Histogram {
        Histogram {
            name: name.into(),
            first_n,
            cache: Vec::with_capacity(first_n),
            generator,
            buckets: Vec::new(),
            counts: Vec::new(),
            committed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn add(&mut self, value: f64) {
        if self.committed {
            // Greatest lower bound <= value; everything below the first
            // bound is counted in bucket 0.
            let bucket = self.buckets.partition_point(|b| *b <= value).saturating_sub(1);
            self.counts[bucket] += 1;
            return;
        }

        self.cache.push(value);
        if self.cache.len() < self.first_n {
            return;
        }

        match (self.generator)(&self.cache) {
            Ok(buckets) if buckets.is_empty() => {
                log::warn!(
                    "Bucket generation for histogram {:?} produced no buckets",
                    self.name
                );
            }
            Ok(buckets) => {
                self.buckets = buckets;
                self.counts = vec![0; self.buckets.len()];
                self.committed = true;
                for value in std::mem::take(&mut self.cache) {
                    self.add(value);
                }
            }
            Err(err) => {
                // Stay in filling; the next add retries the generator.
                log::warn!("Bucket generation for histogram {:?} failed: {err}", self.name);
            }
        }
    }

    /// The frozen bucket bounds and their counts. None while filling.
    pub fn get(&self) -> Option<(&[f64], &[u64])> {
        if self.committed {
            Some((&self.buckets, &self.counts))
        } else {
            None
        }
    }

    /// The first-N capacity and whatever samples are currently cached.
    pub fn cache(&self) -> (usize, &[f64]) {
        (self.first_n, &self.cache)
    }

    /// Samples observed so far: committed counts plus cached samples.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum::<u64>() + self.cache.len() as u64
    }

    /// Serialize for persistence or the wire: name, state, first-N, then
    /// the cache (filling) or the bucket bounds and counts (committed).
    pub fn pack(&self, buf: &mut Vec<u8>) {
        codec::put_u64(buf, self.name.len() as u64);
        buf.extend_from_slice(self.name.as_bytes());
        codec::put_u8(
            buf,
            if self.committed {
                STATE_COMMITTED
            } else {
                STATE_FILLING
            },
        );
        codec::put_u64(buf, self.first_n as u64);
        if self.committed {
            codec::put_u64(buf, self.buckets.len() as u64);
            for bucket in &self.buckets {
                codec::put_f64(buf, *bucket);
            }
            for count in &self.counts {
                codec::put_u64(buf, *count);
            }
        } else {
            codec::put_u64(buf, self.cache.len() as u64);
            for value in &self.cache {
                codec::put_f64(buf, *value);
            }
        }
    }

    pub fn packed_size(&self) -> usize {
        let mut buf = Vec::new();
        self.pack(&mut buf);
        buf.len()
    }

    /// Rebuild a histogram from its packed form. The generator is not part
    /// of the serialization; the caller supplies the one configured for this
    /// name (a committed histogram never invokes it again).
    pub fn unpack(cursor: &mut Cursor, generator: BucketGenerator) -> Result<Histogram, PackError> {
        let name_len = cursor.get_u64()? as usize;
        let name_bytes = cursor.get_bytes(name_len)?;
        let name = String::from_utf8_lossy(&name_bytes).into_owned();

        let state = cursor.get_u8()?;
        let first_n = cursor.get_u64()? as usize;

        match state {
            STATE_FILLING => {
                let cached = cursor.get_u64()? as usize;
                let mut cache = Vec::with_capacity(cached);
                for _ in 0..cached {
                    cache.push(cursor.get_f64()?);
                }
                Ok(Histogram {
                    name,
                    first_n,
                    cache,
                    generator,
                    buckets: Vec::new(),
                    counts: Vec::new(),
                    committed: false,
                })
            }
            STATE_COMMITTED => {
                let len = cursor.get_u64()? as usize;
                let mut buckets = Vec::with_capacity(len);
                for _ in 0..len {
                    buckets.push(cursor.get_f64()?);
                }
                let mut counts = Vec::with_capacity(len);
                for _ in 0..len {
                    counts.push(cursor.get_u64()?);
                }
                Ok(Histogram {
                    name,
                    first_n,
                    cache: Vec::new(),
                    generator,
                    buckets,
                    counts,
                    committed: true,
                })
            }
            other => Err(PackError::BadTag(other)),
        }
    }
}

impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Histogram")
            .field("name", &self.name)
            .field("first_n", &self.first_n)
            .field("cached", &self.cache.len())
            .field("committed", &self.committed)
            .field("buckets", &self.buckets)
            .field("counts", &self.counts)
            .finish()
    }
}

impl PartialEq for Histogram {
    fn eq(&self, other: &Histogram) -> bool {
        self.name == other.name
            && self.first_n == other.first_n
            && self.cache == other.cache
            && self.buckets == other.buckets
            && self.counts == other.counts
            && self.committed == other.committed
    }
}

#[cfg(test)]
mod tests;
