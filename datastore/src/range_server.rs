// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::sync::Arc;

use wire::{
    Bulk, DeleteResponseSlot, GetOpResponseSlot, GetResponseSlot, HistogramResponseSlot,
    PutResponseSlot, Request, Response, Status,
};

use crate::Datastore;

///
/// The receiving half of a rank: takes one bulk request, fans its slots out
/// to the local datastores by their `ds_offset`, and reassembles a response
/// whose slots line up 1:1 with the request. Slots addressed to an offset
/// this rank does not host come back as `Error`.
///
pub struct RangeServer {
    rank: u32,
    datastores: Vec<Arc<Datastore>>,
}

impl RangeServer {
    pub fn new(rank: u32, datastores: Vec<Arc<Datastore>>) -> RangeServer {
        RangeServer { rank, datastores }
    }

    pub fn rank(&self) -> u32 {
        self.rank
    }

    pub fn datastores(&self) -> &[Arc<Datastore>] {
        &self.datastores
    }

    pub fn dispatch(&self, request: &Request) -> Response {
        log::debug!(
            "Rank {} dispatching {} request with {} slot(s) from rank {}",
            self.rank,
            request.op(),
            request.count(),
            request.src()
        );

        match request {
            Request::Put(bulk) => Response::Put(self.run(bulk, Datastore::bput, |slot| {
                PutResponseSlot {
                    ds_offset: slot.ds_offset,
                    token: slot.token,
                    status: Status::Error,
                }
            })),
            Request::Get(bulk) => Response::Get(self.run(bulk, Datastore::bget, |slot| {
                GetResponseSlot {
                    ds_offset: slot.ds_offset,
                    token: slot.token,
                    status: Status::Error,
                    object_type: slot.object_type,
                    object: None,
                }
            })),
            Request::GetOp(bulk) => Response::GetOp(self.run(bulk, Datastore::bgetop, |slot| {
                GetOpResponseSlot {
                    ds_offset: slot.ds_offset,
                    token: slot.token,
                    status: Status::Error,
                    object_type: slot.object_type,
                    records: Vec::new(),
                }
            })),
            Request::Delete(bulk) => Response::Delete(self.run(bulk, Datastore::bdelete, |slot| {
                DeleteResponseSlot {
                    ds_offset: slot.ds_offset,
                    token: slot.token,
                    status: Status::Error,
                }
            })),
            Request::Histogram(bulk) => {
                Response::Histogram(self.run(bulk, Datastore::bhistogram, |slot| {
                    HistogramResponseSlot {
                        ds_offset: slot.ds_offset,
                        token: slot.token,
                        status: Status::Error,
                        histogram: None,
                    }
                }))
            }
        }
    }

    ///
    /// Group request slots by datastore offset (preserving request order
    /// within each group), run each group as one batch against its
    /// datastore, and scatter the results back into request-slot order.
    ///
    fn run<Req: Clone + HasOffset, Resp>(
        &self,
        request: &Bulk<Req>,
        operate: impl Fn(&Datastore, &[Req]) -> Vec<Resp>,
        unroutable: impl Fn(&Req) -> Resp,
    ) -> Bulk<Resp> {
        let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
        for (index, slot) in request.slots.iter().enumerate() {
            let offset = slot.ds_offset() as usize;
            match groups.iter_mut().find(|(o, _)| *o == offset) {
                Some((_, indices)) => indices.push(index),
                None => groups.push((offset, vec![index])),
            }
        }

        let mut out: Vec<Option<Resp>> = Vec::with_capacity(request.slots.len());
        out.resize_with(request.slots.len(), || None);

        for (offset, indices) in groups {
            match self.datastores.get(offset) {
                Some(datastore) => {
                    let batch: Vec<Req> = indices
                        .iter()
                        .map(|i| request.slots[*i].clone())
                        .collect();
                    let responses = operate(datastore.as_ref(), &batch);
                    for (i, response) in indices.into_iter().zip(responses) {
                        out[i] = Some(response);
                    }
                }
                None => {
                    log::warn!(
                        "Rank {} has no datastore at offset {offset}; failing {} slot(s)",
                        self.rank,
                        indices.len()
                    );
                    for i in indices {
                        out[i] = Some(unroutable(&request.slots[i]));
                    }
                }
            }
        }

        let mut response = Bulk::new(self.rank, request.src, request.slots.len());
        for slot in out {
            // Every index was filled by exactly one group.
            response
                .slots
                .push(slot.expect("dispatch filled every slot"));
        }
        response
    }
}

trait HasOffset {
    fn ds_offset(&self) -> u32;
}

macro_rules! has_offset {
    ($($t:ty),*) => {
        $(impl HasOffset for $t {
            fn ds_offset(&self) -> u32 {
                self.ds_offset
            }
        })*
    };
}

has_offset!(
    wire::PutRequestSlot,
    wire::GetRequestSlot,
    wire::GetOpRequestSlot,
    wire::DeleteRequestSlot,
    wire::HistogramRequestSlot
);
