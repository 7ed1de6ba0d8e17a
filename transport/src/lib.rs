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

use std::collections::HashMap;

use wire::{
    DeleteRequest, DeleteResponse, GetOpRequest, GetOpResponse, GetRequest, GetResponse,
    HistogramRequest, HistogramResponse, PutRequest, PutResponse, Request, Response,
};

pub mod mesh;

pub use mesh::{Mesh, MeshTransport};

///
/// The send-many-receive-many primitive between ranks. Implementations send
/// every request concurrently, wait for all responses, and return whatever
/// arrived; a destination that fails simply has no response in the result
/// (the caller reconciles missing results per slot).
///
/// Loopback is never given to a Transport: requests for the local rank go
/// straight to the local range server.
///
pub trait Transport: Send + Sync {
    fn communicate_bput(&self, requests: HashMap<u32, PutRequest>) -> Vec<PutResponse>;
    fn communicate_bget(&self, requests: HashMap<u32, GetRequest>) -> Vec<GetResponse>;
    fn communicate_bgetop(&self, requests: HashMap<u32, GetOpRequest>) -> Vec<GetOpResponse>;
    fn communicate_bdelete(&self, requests: HashMap<u32, DeleteRequest>) -> Vec<DeleteResponse>;
    fn communicate_bhistogram(
        &self,
        requests: HashMap<u32, HistogramRequest>,
    ) -> Vec<HistogramResponse>;

    /// Block until every rank in the world has reached the barrier.
    /// Collective: all ranks must call it or none may.
    fn barrier(&self);
}

/// The receiving side of a rank, as the transport sees it.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: Request) -> Response;
}

impl RequestHandler for datastore::RangeServer {
    fn handle(&self, request: Request) -> Response {
        self.dispatch(&request)
    }
}

///
/// The `None` transport: this process talks to nobody. Remote requests are
/// dropped with a warning and the caller observes missing results, exactly
/// as it would for an unreachable peer.
///
pub struct NullTransport;

impl NullTransport {
    fn drop_all<Req, Resp>(requests: HashMap<u32, Req>) -> Vec<Resp> {
        if !requests.is_empty() {
            log::warn!(
                "No transport is configured; dropping requests for {} destination(s)",
                requests.len()
            );
        }
        Vec::new()
    }
}

impl Transport for NullTransport {
    fn communicate_bput(&self, requests: HashMap<u32, PutRequest>) -> Vec<PutResponse> {
        Self::drop_all(requests)
    }

    fn communicate_bget(&self, requests: HashMap<u32, GetRequest>) -> Vec<GetResponse> {
        Self::drop_all(requests)
    }

    fn communicate_bgetop(&self, requests: HashMap<u32, GetOpRequest>) -> Vec<GetOpResponse> {
        Self::drop_all(requests)
    }

    fn communicate_bdelete(&self, requests: HashMap<u32, DeleteRequest>) -> Vec<DeleteResponse> {
        Self::drop_all(requests)
    }

    fn communicate_bhistogram(
        &self,
        requests: HashMap<u32, HistogramRequest>,
    ) -> Vec<HistogramResponse> {
        Self::drop_all(requests)
    }

    fn barrier(&self) {}
}
