// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use blob::{Blob, DataType};
use parking_lot::{Condvar, Mutex};
use wire::GetOpKind;

///
/// A FIFO of pending client items of one operation kind.
///
/// `take` moves the whole chain out in O(1) and resets the queue; nothing
/// bounds growth except the async-PUT watermark. Two condition variables
/// carry the worker protocol: `start_processing` wakes the worker when the
/// watermark is crossed (or `force` is set), `done_processing` fires after
/// a take for anyone waiting on the queue to drain.
///
pub struct Queue<T> {
    state: Mutex<State<T>>,
    start_processing: Condvar,
    done_processing: Condvar,
}

struct State<T> {
    items: VecDeque<T>,
    force: bool,
    /// True while the worker holds a taken batch it has not finished
    /// reporting; `take_when_idle` waits this out so a flush never races
    /// an in-flight batch.
    processing: bool,
}

impl<T> Queue<T> {
    pub fn new() -> Queue<T> {
        Queue {
            state: Mutex::new(State {
                items: VecDeque::new(),
                force: false,
                processing: false,
            }),
            start_processing: Condvar::new(),
            done_processing: Condvar::new(),
        }
    }

    pub fn insert(&self, item: T) -> usize {
        let mut state = self.state.lock();
        state.items.push_back(item);
        let len = state.items.len();
        self.start_processing.notify_all();
        len
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Move the entire queue out, leaving it empty.
    pub fn take(&self) -> VecDeque<T> {
        let mut state = self.state.lock();
        let items = std::mem::take(&mut state.items);
        self.done_processing.notify_all();
        items
    }

    /// Wake the worker regardless of the watermark (shutdown, sync).
    pub fn force(&self) {
        let mut state = self.state.lock();
        state.force = true;
        self.start_processing.notify_all();
    }

    ///
    /// The flush side when a worker may be draining this queue: wait for
    /// any in-flight batch to finish, then take.
    ///
    pub fn take_when_idle(&self) -> VecDeque<T> {
        let mut state = self.state.lock();
        while state.processing {
            self.done_processing.wait(&mut state);
        }
        std::mem::take(&mut state.items)
    }

    ///
    /// The worker side: block until `len >= watermark`, `force`, or the
    /// instance stops running, then take whatever is queued. A non-empty
    /// take marks the queue as processing until `finish_processing`.
    ///
    pub fn wait_and_take(&self, watermark: usize, running: &AtomicBool) -> VecDeque<T> {
        let mut state = self.state.lock();
        while running.load(Ordering::SeqCst) && !state.force && state.items.len() < watermark {
            self.start_processing.wait(&mut state);
        }
        state.force = false;
        let items = std::mem::take(&mut state.items);
        if !items.is_empty() {
            state.processing = true;
        }
        items
    }

    /// The worker reported its batch; release anyone in `take_when_idle`.
    pub fn finish_processing(&self) {
        let mut state = self.state.lock();
        state.processing = false;
        self.done_processing.notify_all();
    }
}

/// The cached destination of a queued item, filled during shuffle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Target {
    pub ds_id: u32,
    pub rank: u32,
    pub offset: u32,
}

pub struct PutItem {
    pub token: u64,
    pub subject: Blob,
    pub predicate: Blob,
    pub object: Blob,
    pub target: Option<Target>,
    pub enqueued_at: Instant,
}

pub struct GetItem {
    pub token: u64,
    pub subject: Blob,
    pub predicate: Blob,
    pub object_type: DataType,
    pub target: Option<Target>,
    pub enqueued_at: Instant,
}

pub struct GetOpItem {
    pub token: u64,
    pub subject: Blob,
    pub predicate: Blob,
    pub object_type: DataType,
    pub kind: GetOpKind,
    pub num_recs: u64,
    pub target: Option<Target>,
    pub enqueued_at: Instant,
}

pub struct DeleteItem {
    pub token: u64,
    pub subject: Blob,
    pub predicate: Blob,
    pub target: Option<Target>,
    pub enqueued_at: Instant,
}

pub struct HistogramItem {
    pub token: u64,
    /// Histogram requests name a datastore directly instead of hashing.
    pub ds_id: u32,
    pub name: String,
    pub target: Option<Target>,
    pub enqueued_at: Instant,
}

/// One queue per operation kind.
pub struct Queues {
    pub puts: Queue<PutItem>,
    pub gets: Queue<GetItem>,
    pub getops: Queue<GetOpItem>,
    pub deletes: Queue<DeleteItem>,
    pub histograms: Queue<HistogramItem>,
}

impl Queues {
    pub fn new() -> Queues {
        Queues {
            puts: Queue::new(),
            gets: Queue::new(),
            getops: Queue::new(),
            deletes: Queue::new(),
            histograms: Queue::new(),
        }
    }

    /// Drop everything still queued; shutdown calls this after the worker
    /// has been joined.
    pub fn clear(&self) {
        self.puts.take();
        self.gets.take();
        self.getops.take();
        self.deletes.take();
        self.histograms.take();
    }
}
