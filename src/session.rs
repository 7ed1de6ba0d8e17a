// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use blob::{Blob, DataType};
use datastore::in_memory::InMemory;
use datastore::stats::DatastoreStats;
use datastore::transform::Callbacks;
use datastore::{Datastore, RangeServer};
use histogram::Histogram;
use parking_lot::Mutex;
use placement::{DatastoreHash, Placement};
use transport::{Mesh, MeshTransport, NullTransport, Transport};
use wire::{GetOpKind, Op};

use crate::config::{Config, DatastoreKind, TransportKind};
use crate::flush::process;
use crate::queues::{DeleteItem, GetItem, GetOpItem, HistogramItem, PutItem, Queues};
use crate::results::{ResultNode, ResultPayload, Results};
use crate::stats::TrafficStats;
use crate::worker;

/// The rank/size pair every process learns at startup.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Bootstrap {
    pub rank: u32,
    pub size: u32,
}

///
/// Everything the client pipeline, the async-PUT worker, and the ops share.
/// `Session` wraps this in an Arc so the worker thread can outlive any one
/// borrow of the session.
///
pub struct Core {
    pub rank: u32,
    pub size: u32,
    pub placement: Placement,
    pub hash: Arc<dyn DatastoreHash>,
    pub max_ops_per_send: usize,
    pub running: Arc<AtomicBool>,
    pub queues: Queues,
    pub tokens: AtomicU64,
    /// This rank's range server, when it hosts datastores.
    pub local: Option<Arc<RangeServer>>,
    pub transport: Box<dyn Transport>,
    /// Results drained by the async-PUT worker, merged ahead of the next
    /// FlushPuts.
    pub async_put_results: Mutex<Results>,
    pub traffic: Mutex<TrafficStats>,
}

impl Core {
    fn next_token(&self) -> u64 {
        self.tokens.fetch_add(1, Ordering::Relaxed)
    }
}

///
/// One process's handle on the engine: enqueue operations, flush them, and
/// consume result streams. Dropping the session shuts everything down in
/// order: stop, wake and join the worker, join the server thread, drain
/// the queues, close the datastores.
///
pub struct Session {
    pub(crate) core: Arc<Core>,
    put_worker: Option<JoinHandle<()>>,
    server_thread: Option<JoinHandle<()>>,
}

impl Session {
    ///
    /// Single-process bootstrap: a world of one rank with no remote peers.
    ///
    pub fn open(config: Config) -> Result<Session, String> {
        if config.transport.kind == TransportKind::Mesh {
            return Err(
                "a mesh transport spans multiple ranks; build the world with World::open"
                    .to_owned(),
            );
        }
        Session::bootstrap(config, Bootstrap { rank: 0, size: 1 }, None)
    }

    ///
    /// Single-datastore bootstrap: everything this process stores lands in
    /// one datastore named `name`, regardless of the configured ratios or
    /// hash.
    ///
    pub fn open_one(mut config: Config, name: &str) -> Result<Session, String> {
        config.client_ratio = 1;
        config.server_ratio = 1;
        config.datastores_per_server = 1;
        config.hash.name = "rank_zero".to_owned();
        config.datastore.prefix = name.to_owned();
        Session::open(config)
    }

    pub(crate) fn bootstrap(
        config: Config,
        bootstrap: Bootstrap,
        mesh: Option<Arc<Mesh>>,
    ) -> Result<Session, String> {
        config.validate()?;
        if bootstrap.rank >= bootstrap.size {
            return Err(format!(
                "rank {} is outside a world of {}",
                bootstrap.rank, bootstrap.size
            ));
        }

        log::info!(
            "Rank {}/{} starting (client:server {}:{}, {} datastore(s) per server)",
            bootstrap.rank,
            bootstrap.size,
            config.client_ratio,
            config.server_ratio,
            config.datastores_per_server
        );

        let placement = Placement::new(
            bootstrap.size,
            config.client_ratio,
            config.server_ratio,
            config.datastores_per_server,
        )?;
        let total_datastores = placement.total_datastores();

        let hash = placement::hash_by_name(&config.hash.name, total_datastores)
            .ok_or_else(|| format!("unknown hash {:?}", config.hash.name))?;

        let running = Arc::new(AtomicBool::new(true));

        let local = if placement.is_range_server(bootstrap.rank) {
            let mut datastores = Vec::with_capacity(config.datastores_per_server as usize);
            for offset in 0..config.datastores_per_server {
                let id = placement
                    .id(bootstrap.rank, offset)
                    .ok_or_else(|| format!("no datastore id for offset {offset}"))?;
                datastores.push(Arc::new(open_datastore(&config, id)?));
            }
            Some(Arc::new(RangeServer::new(bootstrap.rank, datastores)))
        } else {
            None
        };

        let mut server_thread = None;
        let transport: Box<dyn Transport> = match &mesh {
            Some(mesh) => {
                if let Some(server) = &local {
                    server_thread =
                        Some(mesh.serve(bootstrap.rank, server.clone(), running.clone()));
                }
                let endpoint_group = config
                    .endpoint_group
                    .as_ref()
                    .map(|ranks| ranks.iter().copied().collect());
                Box::new(MeshTransport::new(
                    mesh.clone(),
                    bootstrap.rank,
                    endpoint_group,
                    running.clone(),
                ))
            }
            None => Box::new(NullTransport),
        };

        let core = Arc::new(Core {
            rank: bootstrap.rank,
            size: bootstrap.size,
            placement,
            hash,
            max_ops_per_send: config.max_ops_per_send,
            running,
            queues: Queues::new(),
            tokens: AtomicU64::new(0),
            local,
            transport,
            async_put_results: Mutex::new(Results::new()),
            traffic: Mutex::new(TrafficStats::default()),
        });

        let put_worker = if config.async_puts.enabled {
            Some(worker::spawn_put_worker(
                core.clone(),
                config.async_puts.max_queued,
            ))
        } else {
            None
        };

        Ok(Session {
            core,
            put_worker,
            server_thread,
        })
    }

    pub fn rank(&self) -> u32 {
        self.core.rank
    }

    pub fn size(&self) -> u32 {
        self.core.size
    }

    pub fn is_range_server(&self) -> bool {
        self.core.local.is_some()
    }

    pub fn total_datastores(&self) -> u32 {
        self.core.placement.total_datastores()
    }

    ///
    /// Queue a triple for storage. The object's type tag decides its
    /// encoding and whether it feeds histograms. Nothing touches the
    /// transport until a flush (or the async worker) drains the queue.
    ///
    pub fn put(&self, subject: Blob, predicate: Blob, object: Blob) -> Result<(), String> {
        self.check_running()?;
        check_pair(&subject, &predicate)?;
        if object.is_empty() {
            return Err("put requires a non-empty object".to_owned());
        }

        self.core.queues.puts.insert(PutItem {
            token: self.core.next_token(),
            subject,
            predicate,
            object,
            target: None,
            enqueued_at: Instant::now(),
        });
        Ok(())
    }

    /// Queue a point lookup; `object_type` is the type the caller expects
    /// the stored object to decode to.
    pub fn get(
        &self,
        subject: Blob,
        predicate: Blob,
        object_type: DataType,
    ) -> Result<(), String> {
        self.check_running()?;
        check_pair(&subject, &predicate)?;

        self.core.queues.gets.insert(GetItem {
            token: self.core.next_token(),
            subject,
            predicate,
            object_type,
            target: None,
            enqueued_at: Instant::now(),
        });
        Ok(())
    }

    /// Queue an ordered iteration of up to `num_recs` records.
    pub fn get_op(
        &self,
        subject: Blob,
        predicate: Blob,
        object_type: DataType,
        num_recs: u64,
        kind: GetOpKind,
    ) -> Result<(), String> {
        self.check_running()?;
        if kind.has_seek_key() {
            check_pair(&subject, &predicate)?;
        }
        if num_recs == 0 {
            return Err("get_op requires num_recs >= 1".to_owned());
        }

        self.core.queues.getops.insert(GetOpItem {
            token: self.core.next_token(),
            subject,
            predicate,
            object_type,
            kind,
            num_recs,
            target: None,
            enqueued_at: Instant::now(),
        });
        Ok(())
    }

    pub fn delete(&self, subject: Blob, predicate: Blob) -> Result<(), String> {
        self.check_running()?;
        check_pair(&subject, &predicate)?;

        self.core.queues.deletes.insert(DeleteItem {
            token: self.core.next_token(),
            subject,
            predicate,
            target: None,
            enqueued_at: Instant::now(),
        });
        Ok(())
    }

    /// Queue a request for the named histogram on one datastore.
    pub fn histogram(&self, ds_id: u32, name: &str) -> Result<(), String> {
        self.check_running()?;
        if ds_id >= self.total_datastores() {
            return Err(format!(
                "datastore id {ds_id} is outside [0, {})",
                self.total_datastores()
            ));
        }
        if name.is_empty() {
            return Err("histogram requires a name".to_owned());
        }

        self.core.queues.histograms.insert(HistogramItem {
            token: self.core.next_token(),
            ds_id,
            name: name.to_owned(),
            target: None,
            enqueued_at: Instant::now(),
        });
        Ok(())
    }

    ///
    /// Drain the PUT queue end to end. Any results the async worker
    /// buffered come back first, ahead of this flush's own.
    ///
    pub fn flush_puts(&self) -> Results {
        log::info!(
            "Rank {} flushing {} queued PUT(s)",
            self.core.rank,
            self.core.queues.puts.len()
        );
        // Waiting out an in-flight worker batch first means its results
        // are in the buffer before we take it.
        let items = self.core.queues.puts.take_when_idle();
        let mut results =
            std::mem::replace(&mut *self.core.async_put_results.lock(), Results::new());
        let fresh = process::<PutItem>(&self.core, items);
        results.append(fresh);
        results
    }

    pub fn flush_gets(&self) -> Results {
        log::info!(
            "Rank {} flushing {} queued GET(s)",
            self.core.rank,
            self.core.queues.gets.len()
        );
        process::<GetItem>(&self.core, self.core.queues.gets.take())
    }

    pub fn flush_get_ops(&self) -> Results {
        log::info!(
            "Rank {} flushing {} queued GETOP(s)",
            self.core.rank,
            self.core.queues.getops.len()
        );
        process::<GetOpItem>(&self.core, self.core.queues.getops.take())
    }

    pub fn flush_deletes(&self) -> Results {
        log::info!(
            "Rank {} flushing {} queued DELETE(s)",
            self.core.rank,
            self.core.queues.deletes.len()
        );
        process::<DeleteItem>(&self.core, self.core.queues.deletes.take())
    }

    pub fn flush_histograms(&self) -> Results {
        log::info!(
            "Rank {} flushing {} queued HISTOGRAM(s)",
            self.core.rank,
            self.core.queues.histograms.len()
        );
        process::<HistogramItem>(&self.core, self.core.queues.histograms.take())
    }

    /// Flush every queue: PUTs, then GETs, GETOPs, DELETEs, HISTOGRAMs,
    /// with all returned streams appended in that order.
    pub fn flush(&self) -> Results {
        let mut results = self.flush_puts();
        results.append(self.flush_gets());
        results.append(self.flush_get_ops());
        results.append(self.flush_deletes());
        results.append(self.flush_histograms());
        results
    }

    ///
    /// Flush everything, then sync every local datastore to its backing
    /// store. Collective when a mesh is attached: every rank must call it.
    /// Returns one Sync node per local datastore appended to the flush
    /// results.
    ///
    pub fn sync(&self) -> Results {
        let mut results = self.flush();
        let sync_start = Instant::now();

        self.core.transport.barrier();
        if let Some(server) = &self.core.local {
            for datastore in server.datastores() {
                let status = datastore.sync();
                results.add(ResultNode {
                    op: Op::Sync,
                    range_server: self.core.rank,
                    status,
                    elapsed: sync_start.elapsed(),
                    payload: ResultPayload::Sync,
                });
            }
        }
        self.core.transport.barrier();

        results
    }

    /// Aggregated put/get counters and durations for each local datastore.
    pub fn get_stats(&self) -> Vec<(u32, DatastoreStats)> {
        match &self.core.local {
            Some(server) => server
                .datastores()
                .iter()
                .map(|datastore| (datastore.id(), datastore.stats()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// A human-readable dump of this rank's outgoing traffic.
    pub fn print_stats(&self) -> String {
        self.core.traffic.lock().render(self.core.rank)
    }

    pub fn close(mut self) {
        self.shutdown();
    }

    fn check_running(&self) -> Result<(), String> {
        if self.core.running.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err("the session is shutting down".to_owned())
        }
    }

    fn shutdown(&mut self) {
        if !self.core.running.swap(false, Ordering::SeqCst) {
            return;
        }
        log::info!("Rank {} shutting down", self.core.rank);

        // Wake and join the worker before anything else so it cannot race
        // the queue drain.
        self.core.queues.puts.force();
        if let Some(worker) = self.put_worker.take() {
            if worker.join().is_err() {
                log::error!("Rank {} async-PUT worker panicked", self.core.rank);
            }
        }

        if let Some(server) = self.server_thread.take() {
            if server.join().is_err() {
                log::error!("Rank {} range server thread panicked", self.core.rank);
            }
        }

        self.core.queues.clear();

        if let Some(server) = &self.core.local {
            for datastore in server.datastores() {
                datastore.close();
            }
        }
        log::info!("Rank {} shut down", self.core.rank);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

///
/// Builder for in-process multi-rank worlds: one session per rank, wired
/// together over a channel mesh. The sessions share nothing but the mesh;
/// each owns its queues, worker, and datastores, exactly as separate
/// processes would over a networked substrate.
///
pub struct World;

impl World {
    pub fn open(config: &Config, size: u32) -> Result<Vec<Session>, String> {
        let mesh = Mesh::new(size);
        (0..size)
            .map(|rank| {
                Session::bootstrap(config.clone(), Bootstrap { rank, size }, Some(mesh.clone()))
            })
            .collect()
    }
}

fn check_pair(subject: &Blob, predicate: &Blob) -> Result<(), String> {
    if subject.is_empty() {
        return Err("the subject must be non-empty".to_owned());
    }
    if predicate.is_empty() {
        return Err("the predicate must be non-empty".to_owned());
    }
    Ok(())
}

fn open_datastore(config: &Config, id: u32) -> Result<Datastore, String> {
    let histograms: Vec<Histogram> = config
        .histograms
        .names
        .iter()
        .map(|name| {
            Histogram::new(
                name.clone(),
                config.histograms.first_n,
                histogram::uniform(config.histograms.buckets),
            )
        })
        .collect();

    let backend: Box<dyn datastore::backend::Backend> = match config.datastore.kind {
        DatastoreKind::InMemory => {
            Box::new(InMemory::new(format!("{}-{id}", config.datastore.prefix)))
        }
        #[cfg(feature = "rocksdb")]
        DatastoreKind::RocksDb => Box::new(datastore::rocks::RocksDb::open(
            format!("{}-{id}", config.datastore.prefix),
            config.datastore.create_if_missing,
        )?),
        #[cfg(not(feature = "rocksdb"))]
        DatastoreKind::RocksDb => {
            return Err("this build does not include the rocksdb backend".to_owned());
        }
    };

    Datastore::new(
        id,
        backend,
        Callbacks::default_callbacks(),
        histograms,
        config.histograms.read,
        config.histograms.write,
    )
}
