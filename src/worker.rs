// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::flush::process;
use crate::queues::PutItem;
use crate::session::Core;

///
/// The async-PUT worker: sleep on the put queue's condition variable until
/// the watermark is crossed (or shutdown forces a wake), drain the whole
/// queue through the same pipeline FlushPuts runs, and append the outcome
/// to the buffered result stream that the next FlushPuts hands back.
///
pub fn spawn_put_worker(core: Arc<Core>, watermark: usize) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("async-put-worker".to_owned())
        .spawn(move || {
            log::debug!(
                "Rank {} async-PUT worker started (watermark {watermark})",
                core.rank
            );
            loop {
                let items = core.queues.puts.wait_and_take(watermark, &core.running);
                if items.is_empty() {
                    if !core.running.load(Ordering::SeqCst) {
                        break;
                    }
                    // A forced wake with nothing queued.
                } else {
                    let count = items.len();
                    let results = process::<PutItem>(&core, items);
                    log::debug!(
                        "Rank {} async-PUT worker drained {count} item(s) into {} result(s)",
                        core.rank,
                        results.size()
                    );
                    core.async_put_results.lock().append(results);
                    core.queues.puts.finish_processing();
                }
            }
            log::debug!("Rank {} async-PUT worker stopped", core.rank);
        })
        .expect("failed to spawn the async-PUT worker")
}
