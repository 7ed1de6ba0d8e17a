// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The in-process transport: one inbox per rank, payloads crossing as
//! packed wire bytes so multi-rank tests and demos exercise the same codec
//! a networked substrate would.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use wire::{
    DeleteRequest, DeleteResponse, GetOpRequest, GetOpResponse, GetRequest, GetResponse,
    HistogramRequest, HistogramResponse, PutRequest, PutResponse, Request, Response,
};

use crate::{RequestHandler, Transport};

/// How often blocked receives wake up to check the running flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

struct Envelope {
    payload: Vec<u8>,
    reply: Sender<Vec<u8>>,
}

///
/// The shared wiring for one world: an inbox per serving rank and a barrier
/// sized to the world. Build one Mesh, then hand every rank a
/// `MeshTransport` view of it.
///
pub struct Mesh {
    size: u32,
    inboxes: Mutex<HashMap<u32, Sender<Envelope>>>,
    barrier: Barrier,
}

impl Mesh {
    pub fn new(size: u32) -> Arc<Mesh> {
        Arc::new(Mesh {
            size,
            inboxes: Mutex::new(HashMap::new()),
            barrier: Barrier::new(size as usize),
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    ///
    /// Register `rank` as a server and spawn its service thread: unpack a
    /// request, hand it to the range server, pack the response back. The
    /// thread drains whatever is queued, then exits once `running` flips.
    ///
    pub fn serve(
        &self,
        rank: u32,
        handler: Arc<dyn RequestHandler>,
        running: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        let (sender, receiver) = unbounded::<Envelope>();
        self.inboxes.lock().insert(rank, sender);

        std::thread::Builder::new()
            .name(format!("range-server-{rank}"))
            .spawn(move || {
                log::debug!("Rank {rank} range server thread started");
                loop {
                    match receiver.recv_timeout(POLL_INTERVAL) {
                        Ok(envelope) => {
                            match Request::unpack(Bytes::from(envelope.payload)) {
                                Ok(request) => {
                                    let response = handler.handle(request);
                                    // A dropped reply receiver means the
                                    // client gave up; nothing to do.
                                    let _ = envelope.reply.send(response.pack());
                                }
                                Err(err) => {
                                    log::warn!("Rank {rank} received an unreadable request: {err}");
                                }
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            if !running.load(Ordering::SeqCst) {
                                break;
                            }
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::debug!("Rank {rank} range server thread stopped");
            })
            .expect("failed to spawn range server thread")
    }

    fn post(&self, dst: u32, payload: Vec<u8>) -> Result<Receiver<Vec<u8>>, String> {
        let inbox = self
            .inboxes
            .lock()
            .get(&dst)
            .cloned()
            .ok_or_else(|| format!("rank {dst} is not a registered server"))?;
        let (reply, response) = bounded(1);
        inbox
            .send(Envelope { payload, reply })
            .map_err(|_| format!("rank {dst} stopped serving"))?;
        Ok(response)
    }
}

///
/// One rank's view of the mesh. Requests to every destination are posted
/// up front (sends never block), then the responses are collected; flipping
/// `running` unblocks the collection at its next poll and returns whatever
/// completed.
///
pub struct MeshTransport {
    mesh: Arc<Mesh>,
    rank: u32,
    /// When set, the subset of server ranks this client will talk to.
    endpoint_group: Option<HashSet<u32>>,
    running: Arc<AtomicBool>,
}

impl MeshTransport {
    pub fn new(
        mesh: Arc<Mesh>,
        rank: u32,
        endpoint_group: Option<HashSet<u32>>,
        running: Arc<AtomicBool>,
    ) -> MeshTransport {
        MeshTransport {
            mesh,
            rank,
            endpoint_group,
            running,
        }
    }

    fn communicate(&self, requests: Vec<Request>) -> Vec<Response> {
        let mut pending = Vec::with_capacity(requests.len());
        for request in requests {
            let dst = request.dst();
            if let Some(group) = &self.endpoint_group {
                if !group.contains(&dst) {
                    log::warn!(
                        "Rank {} dropping a {} request: rank {dst} is outside the endpoint group",
                        self.rank,
                        request.op()
                    );
                    continue;
                }
            }
            match self.mesh.post(dst, request.pack()) {
                Ok(receiver) => pending.push((dst, receiver)),
                Err(err) => {
                    log::warn!("Rank {} failed to send to rank {dst}: {err}", self.rank);
                }
            }
        }

        let mut responses = Vec::with_capacity(pending.len());
        for (dst, receiver) in pending {
            loop {
                match receiver.recv_timeout(POLL_INTERVAL) {
                    Ok(payload) => {
                        match Response::unpack(Bytes::from(payload)) {
                            Ok(response) => responses.push(response),
                            Err(err) => {
                                log::warn!(
                                    "Rank {} received an unreadable response from rank {dst}: {err}",
                                    self.rank
                                );
                            }
                        }
                        break;
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        if !self.running.load(Ordering::SeqCst) {
                            log::debug!(
                                "Rank {} shutting down while waiting on rank {dst}",
                                self.rank
                            );
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        log::warn!("Rank {dst} dropped a request from rank {}", self.rank);
                        break;
                    }
                }
            }
        }
        responses
    }

    fn typed<Req, Resp>(
        &self,
        requests: HashMap<u32, wire::Bulk<Req>>,
        wrap: impl Fn(wire::Bulk<Req>) -> Request,
        unwrap: impl Fn(Response) -> Option<wire::Bulk<Resp>>,
    ) -> Vec<wire::Bulk<Resp>> {
        let wrapped = requests.into_values().map(wrap).collect();
        self.communicate(wrapped)
            .into_iter()
            .filter_map(|response| {
                let op = response.op();
                let unwrapped = unwrap(response);
                if unwrapped.is_none() {
                    log::warn!("Rank {} discarding a mismatched {op} response", self.rank);
                }
                unwrapped
            })
            .collect()
    }
}

impl Transport for MeshTransport {
    fn communicate_bput(&self, requests: HashMap<u32, PutRequest>) -> Vec<PutResponse> {
        self.typed(requests, Request::Put, |response| match response {
            Response::Put(bulk) => Some(bulk),
            _ => None,
        })
    }

    fn communicate_bget(&self, requests: HashMap<u32, GetRequest>) -> Vec<GetResponse> {
        self.typed(requests, Request::Get, |response| match response {
            Response::Get(bulk) => Some(bulk),
            _ => None,
        })
    }

    fn communicate_bgetop(&self, requests: HashMap<u32, GetOpRequest>) -> Vec<GetOpResponse> {
        self.typed(requests, Request::GetOp, |response| match response {
            Response::GetOp(bulk) => Some(bulk),
            _ => None,
        })
    }

    fn communicate_bdelete(&self, requests: HashMap<u32, DeleteRequest>) -> Vec<DeleteResponse> {
        self.typed(requests, Request::Delete, |response| match response {
            Response::Delete(bulk) => Some(bulk),
            _ => None,
        })
    }

    fn communicate_bhistogram(
        &self,
        requests: HashMap<u32, HistogramRequest>,
    ) -> Vec<HistogramResponse> {
        self.typed(requests, Request::Histogram, |response| match response {
            Response::Histogram(bulk) => Some(bulk),
            _ => None,
        })
    }

    fn barrier(&self) {
        self.mesh.barrier.wait();
    }
}
