// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::HashMap;
use std::fmt::Write;

use itertools::Itertools;
use wire::{Op, BULK_OPS};

///
/// Client-side traffic accounting: how full outgoing bulk requests were
/// and how many went to each destination, per operation kind. Recorded at
/// send time under the session's stats mutex.
///
#[derive(Default)]
pub struct TrafficStats {
    fill_ratios: HashMap<Op, Vec<f64>>,
    outgoing: HashMap<Op, HashMap<u32, u64>>,
}

impl TrafficStats {
    pub fn record(&mut self, op: Op, dst: u32, fill_ratio: f64) {
        self.fill_ratios.entry(op).or_default().push(fill_ratio);
        *self
            .outgoing
            .entry(op)
            .or_default()
            .entry(dst)
            .or_default() += 1;
    }

    pub fn messages_sent(&self, op: Op) -> u64 {
        self.outgoing
            .get(&op)
            .map(|dsts| dsts.values().sum())
            .unwrap_or(0)
    }

    /// A human-readable dump, one line per op with traffic.
    pub fn render(&self, rank: u32) -> String {
        let mut out = String::new();
        for op in BULK_OPS {
            let ratios = match self.fill_ratios.get(&op) {
                Some(ratios) if !ratios.is_empty() => ratios,
                _ => continue,
            };
            let sent = self.messages_sent(op);
            let mean = ratios.iter().sum::<f64>() / ratios.len() as f64;
            let dsts = self
                .outgoing
                .get(&op)
                .map(|dsts| {
                    dsts.iter()
                        .sorted()
                        .map(|(dst, count)| format!("{dst}:{count}"))
                        .join(" ")
                })
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "rank {rank} {op}: {sent} message(s), mean fill {mean:.2}, per-destination {{{dsts}}}"
            );
        }
        out
    }
}
