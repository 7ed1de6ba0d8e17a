// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::time::Duration;

use blob::{Blob, DataType};
use histogram::Histogram;
use wire::{Op, Status};

/// The per-kind payload of one result node.
#[derive(Clone, Debug)]
pub enum ResultPayload {
    Put {
        subject: Blob,
        predicate: Blob,
    },
    Get {
        subject: Blob,
        predicate: Blob,
        object_type: DataType,
        object: Option<Blob>,
    },
    GetOp {
        subject: Blob,
        predicate: Blob,
        object_type: DataType,
        object: Option<Blob>,
    },
    Delete {
        subject: Blob,
        predicate: Blob,
    },
    Sync,
    Histogram {
        /// Present only when the named histogram was found.
        histogram: Option<Histogram>,
    },
}

///
/// One per-slot outcome. Subjects and predicates are handed back as views
/// of the caller's original blobs (a GetOp record carries the server's
/// copies instead, since those records were never enqueued).
///
#[derive(Clone, Debug)]
pub struct ResultNode {
    pub op: Op,
    /// The rank of the range server that answered.
    pub range_server: u32,
    pub status: Status,
    /// Enqueue (or flush start, for sync nodes) to materialization.
    pub elapsed: Duration,
    pub payload: ResultPayload,
}

///
/// The stream a flush returns: every per-slot outcome in arrival order,
/// walked with an internal cursor. Typed accessors answer only when the
/// cursor sits on a node of the matching kind.
///
pub struct Results {
    nodes: Vec<ResultNode>,
    cursor: usize,
    duration: Duration,
}

impl Results {
    pub fn new() -> Results {
        Results {
            nodes: Vec::new(),
            cursor: 0,
            duration: Duration::ZERO,
        }
    }

    pub fn add(&mut self, node: ResultNode) {
        self.nodes.push(node);
    }

    /// Splice another stream onto this one; durations accumulate.
    pub fn append(&mut self, mut other: Results) {
        self.nodes.append(&mut other.nodes);
        self.duration += other.duration;
    }

    pub fn add_duration(&mut self, duration: Duration) {
        self.duration += duration;
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn go_to_head(&mut self) {
        self.cursor = 0;
    }

    pub fn go_to_next(&mut self) {
        if self.cursor < self.nodes.len() {
            self.cursor += 1;
        }
    }

    pub fn valid(&self) -> bool {
        self.cursor < self.nodes.len()
    }

    pub fn curr(&self) -> Option<&ResultNode> {
        self.nodes.get(self.cursor)
    }

    pub fn op(&self) -> Option<Op> {
        self.curr().map(|node| node.op)
    }

    pub fn status(&self) -> Option<Status> {
        self.curr().map(|node| node.status)
    }

    pub fn range_server(&self) -> Option<u32> {
        self.curr().map(|node| node.range_server)
    }

    pub fn timestamps(&self) -> Option<Duration> {
        self.curr().map(|node| node.elapsed)
    }

    pub fn subject(&self) -> Option<&Blob> {
        match self.curr().map(|node| &node.payload) {
            Some(ResultPayload::Put { subject, .. })
            | Some(ResultPayload::Get { subject, .. })
            | Some(ResultPayload::GetOp { subject, .. })
            | Some(ResultPayload::Delete { subject, .. }) => Some(subject),
            _ => None,
        }
    }

    pub fn predicate(&self) -> Option<&Blob> {
        match self.curr().map(|node| &node.payload) {
            Some(ResultPayload::Put { predicate, .. })
            | Some(ResultPayload::Get { predicate, .. })
            | Some(ResultPayload::GetOp { predicate, .. })
            | Some(ResultPayload::Delete { predicate, .. }) => Some(predicate),
            _ => None,
        }
    }

    /// The returned object; present only on successful Get/GetOp nodes.
    pub fn object(&self) -> Option<&Blob> {
        match self.curr().map(|node| &node.payload) {
            Some(ResultPayload::Get { object, .. })
            | Some(ResultPayload::GetOp { object, .. }) => object.as_ref(),
            _ => None,
        }
    }

    pub fn object_type(&self) -> Option<DataType> {
        match self.curr().map(|node| &node.payload) {
            Some(ResultPayload::Get { object_type, .. })
            | Some(ResultPayload::GetOp { object_type, .. }) => Some(*object_type),
            _ => None,
        }
    }

    pub fn histogram(&self) -> Option<&Histogram> {
        match self.curr().map(|node| &node.payload) {
            Some(ResultPayload::Histogram { histogram }) => histogram.as_ref(),
            _ => None,
        }
    }

    /// Iterate without disturbing the cursor.
    pub fn iter(&self) -> std::slice::Iter<'_, ResultNode> {
        self.nodes.iter()
    }
}
