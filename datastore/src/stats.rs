// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::time::{Duration, Instant};

/// One timed batch against a datastore.
#[derive(Clone, Copy, Debug)]
pub struct Event {
    pub start: Instant,
    pub end: Instant,
    pub count: usize,
    pub size: usize,
}

impl Event {
    pub fn begin(count: usize) -> Event {
        let now = Instant::now();
        Event {
            start: now,
            end: now,
            count,
            size: 0,
        }
    }

    pub fn finish(mut self) -> Event {
        self.end = Instant::now();
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.end.duration_since(self.start)
    }
}

/// Append-only event streams, one for puts and one for gets, recorded for
/// the lifetime of a datastore and aggregated on demand.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    pub puts: Vec<Event>,
    pub gets: Vec<Event>,
}

impl EventLog {
    pub fn aggregate(&self) -> DatastoreStats {
        DatastoreStats {
            put_time: self.puts.iter().map(Event::elapsed).sum(),
            num_puts: self.puts.iter().map(|e| e.count as u64).sum(),
            get_time: self.gets.iter().map(Event::elapsed).sum(),
            num_gets: self.gets.iter().map(|e| e.count as u64).sum(),
        }
    }
}

/// The reduction over a datastore's event streams, returned to the user.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DatastoreStats {
    pub put_time: Duration,
    pub num_puts: u64,
    pub get_time: Duration,
    pub num_gets: u64,
}
