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

//! A distributed triple-keyed key-value engine.
//!
//! Each participating rank is a client, a range server, or both. Clients
//! queue (subject, predicate, object) operations without blocking; a flush
//! shuffles every queued item toward the datastore a deterministic hash
//! picks for it, batches items per destination, exchanges the batches over
//! the transport, and returns a unified result stream carrying per-item
//! status.
//!
//! ```no_run
//! use blob::{Blob, DataType};
//! use trellis::{Config, Session};
//!
//! # fn main() -> Result<(), String> {
//! let session = Session::open(Config::default())?;
//! session.put(
//!     Blob::owned(b"subject".to_vec(), DataType::Byte),
//!     Blob::owned(b"predicate".to_vec(), DataType::Byte),
//!     Blob::owned(b"object".to_vec(), DataType::Byte),
//! )?;
//! let results = session.flush_puts();
//! assert_eq!(results.size(), 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
mod flush;
mod queues;
pub mod results;
mod session;
mod shuffle;
mod stats;
mod worker;

pub use blob::{Blob, DataType};
pub use config::{Config, DatastoreKind, TransportKind};
pub use datastore::stats::DatastoreStats;
pub use results::{ResultNode, ResultPayload, Results};
pub use session::{Bootstrap, Session, World};
pub use wire::{GetOpKind, Op, Status};

#[cfg(test)]
mod tests;
