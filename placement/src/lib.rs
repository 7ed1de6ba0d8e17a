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

use std::sync::Arc;

///
/// Whether a rank hosts datastores. Within each group of `client_ratio`
/// ranks, the first `server_ratio` serve. This predicate is the basis of
/// every placement decision.
///
/// Worked example with client:server = 5:3 and 4 datastores per server:
///
/// ```text
/// Rank:         |     0   |     1   |    2      | 3 | 4 |      5      |       6     |      7      | 8 | 9 |
/// Range server: |     0   |     1   |    2      |   |   |      3      |       4     |      5      |   |   |
/// Datastore:    | 0 1 2 3 | 4 5 6 7 | 8 9 10 11 |   |   | 12 13 14 15 | 16 17 18 19 | 20 21 22 23 |   |   |
/// ```
///
pub fn is_range_server(rank: u32, client_ratio: u32, server_ratio: u32) -> bool {
    (rank % client_ratio) < server_ratio
}

///
/// The pure mapping between datastore ids and (rank, local offset) pairs,
/// fixed by the ratios and the world size at init time.
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Placement {
    world_size: u32,
    client_ratio: u32,
    server_ratio: u32,
    datastores_per_server: u32,
}

impl Placement {
    pub fn new(
        world_size: u32,
        client_ratio: u32,
        server_ratio: u32,
        datastores_per_server: u32,
    ) -> Result<Placement, String> {
        if world_size == 0 || client_ratio == 0 || server_ratio == 0 || datastores_per_server == 0 {
            return Err(format!(
                "invalid placement: world size {world_size}, ratio {client_ratio}:{server_ratio}, \
                 {datastores_per_server} datastores per server (all must be nonzero)"
            ));
        }
        Ok(Placement {
            world_size,
            client_ratio,
            server_ratio,
            datastores_per_server,
        })
    }

    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    pub fn datastores_per_server(&self) -> u32 {
        self.datastores_per_server
    }

    pub fn is_range_server(&self, rank: u32) -> bool {
        rank < self.world_size && is_range_server(rank, self.client_ratio, self.server_ratio)
    }

    /// How many ranks serve. Whole blocks contribute `server_ratio` servers
    /// each; a trailing partial block contributes at most that many.
    pub fn total_range_servers(&self) -> u32 {
        if self.client_ratio <= self.server_ratio {
            return self.world_size;
        }
        let whole_blocks = self.world_size / self.client_ratio;
        let remaining = self.world_size % self.client_ratio;
        self.server_ratio * whole_blocks + remaining.min(self.server_ratio)
    }

    pub fn total_datastores(&self) -> u32 {
        self.total_range_servers() * self.datastores_per_server
    }

    /// The position of `rank` among the serving ranks, if it serves.
    pub fn server_index(&self, rank: u32) -> Option<u32> {
        if !self.is_range_server(rank) {
            return None;
        }
        Some((rank / self.client_ratio) * self.server_ratio + (rank % self.client_ratio))
    }

    /// Datastore id hosted at (rank, offset), if rank serves and the offset
    /// is in range.
    pub fn id(&self, rank: u32, offset: u32) -> Option<u32> {
        if offset >= self.datastores_per_server {
            return None;
        }
        self.server_index(rank)
            .map(|server| server * self.datastores_per_server + offset)
    }

    /// The rank hosting a datastore id.
    pub fn rank(&self, id: u32) -> Option<u32> {
        if id >= self.total_datastores() {
            return None;
        }
        let server = id / self.datastores_per_server;
        let block = server / self.server_ratio;
        let within = server % self.server_ratio;
        Some(block * self.client_ratio + within)
    }

    /// The local offset of a datastore id on its hosting rank.
    pub fn offset(&self, id: u32) -> Option<u32> {
        if id >= self.total_datastores() {
            return None;
        }
        Some(id % self.datastores_per_server)
    }
}

///
/// A pluggable function from (subject, predicate) to a datastore id. The
/// choice is fixed at init; every queued operation goes through exactly one
/// of these during the shuffle step.
///
pub trait DatastoreHash: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns a datastore id in [0, total_datastores), or None when the
    /// pair cannot be placed.
    fn hash(&self, subject: &[u8], predicate: &[u8]) -> Option<u32>;
}

/// All traffic lands on datastore 0. Used in single-datastore mode.
pub struct RankZero;

impl DatastoreHash for RankZero {
    fn name(&self) -> &'static str {
        "rank_zero"
    }

    fn hash(&self, _subject: &[u8], _predicate: &[u8]) -> Option<u32> {
        Some(0)
    }
}

/// Byte-sum of subject and predicate modulo the total datastore count. The
/// default placement function.
pub struct SumModDatastores {
    total_datastores: u32,
}

impl SumModDatastores {
    pub fn new(total_datastores: u32) -> SumModDatastores {
        SumModDatastores { total_datastores }
    }
}

impl DatastoreHash for SumModDatastores {
    fn name(&self) -> &'static str {
        "sum_mod_datastores"
    }

    fn hash(&self, subject: &[u8], predicate: &[u8]) -> Option<u32> {
        if self.total_datastores == 0 {
            return None;
        }
        let sum = subject
            .iter()
            .chain(predicate.iter())
            .fold(0_u64, |acc, byte| acc.wrapping_add(u64::from(*byte)));
        Some((sum % u64::from(self.total_datastores)) as u32)
    }
}

/// Look a hash up by its configured name.
pub fn hash_by_name(name: &str, total_datastores: u32) -> Option<Arc<dyn DatastoreHash>> {
    match name {
        "rank_zero" => Some(Arc::new(RankZero)),
        "sum_mod_datastores" => Some(Arc::new(SumModDatastores::new(total_datastores))),
        _ => {
            log::warn!("Unknown hash name {name:?}");
            None
        }
    }
}
