// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The flush pipeline: repeatedly shuffle queued items into one local bulk
//! request plus one bulk request per remote destination, exchange them,
//! and fold the responses into a result stream. A round may leave items
//! behind when a destination bulk fills; the loop runs until the queue is
//! empty or the instance stops running.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::Ordering;
use std::time::Instant;

use wire::Bulk;

use crate::results::Results;
use crate::session::Core;
use crate::shuffle::{shuffle, Ledger, Queued, Shuffled};

pub fn process<T: Queued>(core: &Core, mut items: VecDeque<T>) -> Results {
    let mut results = Results::new();
    if items.is_empty() {
        return results;
    }

    let flush_start = Instant::now();
    let mut ledger: Ledger = HashMap::new();

    log::debug!(
        "Rank {} processing {} {} item(s)",
        core.rank,
        items.len(),
        T::OP
    );

    while !items.is_empty() {
        let mut local: Bulk<T::RequestSlot> = Bulk::new(core.rank, core.rank, core.max_ops_per_send);
        let mut remote: HashMap<u32, Bulk<T::RequestSlot>> = HashMap::new();
        let mut leftover = VecDeque::new();

        while let Some(item) = items.pop_front() {
            match shuffle(core, item, &mut local, &mut remote, &mut ledger) {
                Shuffled::Placed => (),
                // Full bulk this round; the item comes back next round.
                Shuffled::NoSpace(item) => leftover.push_back(item),
                Shuffled::Error => (),
            }
        }
        items = leftover;

        if !remote.is_empty() {
            {
                let mut traffic = core.traffic.lock();
                for (dst, bulk) in &remote {
                    traffic.record(T::OP, *dst, bulk.fill_ratio());
                }
            }
            log::debug!(
                "Rank {} sending {} bulk request(s) to remote server(s)",
                core.rank,
                remote.len()
            );
            for bulk in T::communicate(core, remote) {
                let range_server = bulk.src;
                for slot in bulk.slots {
                    for node in T::result_nodes(slot, range_server, &mut ledger) {
                        results.add(node);
                    }
                }
            }
        }

        if !local.is_empty() {
            core.traffic
                .lock()
                .record(T::OP, core.rank, local.fill_ratio());
            match &core.local {
                Some(server) => {
                    if let Some(bulk) = T::dispatch_local(server, local) {
                        let range_server = bulk.src;
                        for slot in bulk.slots {
                            for node in T::result_nodes(slot, range_server, &mut ledger) {
                                results.add(node);
                            }
                        }
                    } else {
                        log::warn!(
                            "Rank {} local dispatch returned a mismatched {} response",
                            core.rank,
                            T::OP
                        );
                    }
                }
                None => {
                    // The hash placed items on this rank, but it serves no
                    // datastores; nothing can answer them.
                    log::warn!(
                        "Rank {} is not a range server but holds a local {} bulk; dropping it",
                        core.rank,
                        T::OP
                    );
                }
            }
        }

        // Mid-shutdown a flush returns whatever completed.
        if !core.running.load(Ordering::SeqCst) {
            break;
        }
    }

    if !ledger.is_empty() {
        log::warn!(
            "Rank {}: {} {} item(s) received no response",
            core.rank,
            ledger.len(),
            T::OP
        );
    }

    log::debug!(
        "Rank {} produced {} {} result node(s)",
        core.rank,
        results.size(),
        T::OP
    );
    results.add_duration(flush_start.elapsed());
    results
}
