// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::time::Duration;

use blob::{Blob, DataType};
use wire::{Op, Status};

use crate::config::{Config, DatastoreKind, TransportKind};
use crate::results::{ResultNode, ResultPayload, Results};
use crate::session::Session;

pub(crate) fn byte_blob(data: &[u8]) -> Blob {
    Blob::owned(data.to_vec(), DataType::Byte)
}

mod config {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.client_ratio, 1);
        assert_eq!(config.datastore.kind, DatastoreKind::InMemory);
        assert_eq!(config.transport.kind, TransportKind::None);
    }

    #[test]
    fn toml_overrides_only_what_it_names() {
        let config = Config::from_toml_str(
            r#"
            client_ratio = 5
            server_ratio = 3
            datastores_per_server = 4

            [datastore]
            kind = "in_memory"
            prefix = "scratch"

            [async_puts]
            enabled = true
            max_queued = 64

            [histograms]
            names = ["temperature"]
            first_n = 4

            [hash]
            name = "rank_zero"
            "#,
        )
        .unwrap();

        assert_eq!(config.client_ratio, 5);
        assert_eq!(config.server_ratio, 3);
        assert_eq!(config.datastores_per_server, 4);
        assert_eq!(config.datastore.prefix, "scratch");
        assert!(config.async_puts.enabled);
        assert_eq!(config.async_puts.max_queued, 64);
        assert_eq!(config.histograms.names, vec!["temperature".to_owned()]);
        assert_eq!(config.histograms.first_n, 4);
        assert_eq!(config.hash.name, "rank_zero");
        // Untouched fields keep their defaults.
        assert_eq!(config.max_ops_per_send, 256);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Config::from_toml_str("no_such_option = 3").is_err());
    }

    #[test]
    fn zero_ratios_are_rejected() {
        assert!(Config::from_toml_str("client_ratio = 0").is_err());
        assert!(Config::from_toml_str("max_ops_per_send = 0").is_err());
        assert!(Config::from_toml_str("[histograms]\nfirst_n = 0").is_err());
    }

    #[test]
    fn empty_endpoint_group_is_rejected() {
        assert!(Config::from_toml_str("endpoint_group = []").is_err());
        assert!(Config::from_toml_str("endpoint_group = [0, 2]").is_ok());
    }
}

mod queues {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::queues::Queue;

    #[test]
    fn take_moves_the_whole_chain_out() {
        let queue = Queue::new();
        for i in 0..5 {
            queue.insert(i);
        }
        assert_eq!(queue.len(), 5);

        let items: Vec<i32> = queue.take().into_iter().collect();
        assert_eq!(items, vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.len(), 0);
        assert!(queue.take().is_empty());
    }

    #[test]
    fn worker_wakes_at_the_watermark() {
        let queue = Arc::new(Queue::new());
        let running = Arc::new(AtomicBool::new(true));

        let worker = {
            let queue = queue.clone();
            let running = running.clone();
            std::thread::spawn(move || queue.wait_and_take(3, &running))
        };

        queue.insert(1);
        queue.insert(2);
        // Below the watermark the worker stays asleep.
        std::thread::sleep(Duration::from_millis(50));
        queue.insert(3);

        let items = worker.join().unwrap();
        assert_eq!(items.len(), 3);
        queue.finish_processing();
    }

    #[test]
    fn force_wakes_the_worker_below_the_watermark() {
        let queue: Arc<Queue<i32>> = Arc::new(Queue::new());
        let running = Arc::new(AtomicBool::new(true));

        let worker = {
            let queue = queue.clone();
            let running = running.clone();
            std::thread::spawn(move || queue.wait_and_take(1000, &running))
        };

        queue.insert(7);
        queue.force();
        let items = worker.join().unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn stopping_releases_a_waiting_worker() {
        let queue: Arc<Queue<i32>> = Arc::new(Queue::new());
        let running = Arc::new(AtomicBool::new(true));

        let worker = {
            let queue = queue.clone();
            let running = running.clone();
            std::thread::spawn(move || queue.wait_and_take(1000, &running))
        };

        running.store(false, Ordering::SeqCst);
        queue.force();
        assert!(worker.join().unwrap().is_empty());
    }

    #[test]
    fn take_when_idle_waits_out_an_in_flight_batch() {
        let queue: Arc<Queue<i32>> = Arc::new(Queue::new());
        let running = Arc::new(AtomicBool::new(true));

        queue.insert(1);
        let taken = queue.wait_and_take(1, &running);
        assert_eq!(taken.len(), 1);

        // The worker still owns its batch; a flush must wait.
        let flusher = {
            let queue = queue.clone();
            std::thread::spawn(move || queue.take_when_idle())
        };
        std::thread::sleep(Duration::from_millis(50));
        assert!(!flusher.is_finished());

        queue.finish_processing();
        assert!(flusher.join().unwrap().is_empty());
    }
}

mod results {
    use super::*;

    fn node(op: Op, status: Status) -> ResultNode {
        ResultNode {
            op,
            range_server: 3,
            status,
            elapsed: Duration::from_millis(1),
            payload: match op {
                Op::Put => ResultPayload::Put {
                    subject: byte_blob(b"s"),
                    predicate: byte_blob(b"p"),
                },
                Op::Get => ResultPayload::Get {
                    subject: byte_blob(b"s"),
                    predicate: byte_blob(b"p"),
                    object_type: DataType::Byte,
                    object: Some(byte_blob(b"o")),
                },
                _ => ResultPayload::Sync,
            },
        }
    }

    #[test]
    fn cursor_walks_in_arrival_order() {
        let mut results = Results::new();
        results.add(node(Op::Put, Status::Success));
        results.add(node(Op::Get, Status::Success));
        assert_eq!(results.size(), 2);

        results.go_to_head();
        assert!(results.valid());
        assert_eq!(results.op(), Some(Op::Put));
        results.go_to_next();
        assert_eq!(results.op(), Some(Op::Get));
        results.go_to_next();
        assert!(!results.valid());
        assert_eq!(results.op(), None);

        results.go_to_head();
        assert_eq!(results.op(), Some(Op::Put));
    }

    #[test]
    fn typed_accessors_answer_only_for_matching_kinds() {
        let mut results = Results::new();
        results.add(node(Op::Put, Status::Success));
        results.add(node(Op::Get, Status::Success));
        results.add(node(Op::Sync, Status::Success));
        results.go_to_head();

        // Put: pair but no object, no histogram.
        assert_eq!(results.subject().unwrap().data(), b"s");
        assert!(results.object().is_none());
        assert!(results.histogram().is_none());
        assert_eq!(results.range_server(), Some(3));
        assert!(results.timestamps().unwrap() > Duration::ZERO);

        // Get: pair and object.
        results.go_to_next();
        assert_eq!(results.object().unwrap().data(), b"o");
        assert_eq!(results.object_type(), Some(DataType::Byte));

        // Sync: nothing extra.
        results.go_to_next();
        assert!(results.subject().is_none());
        assert!(results.object().is_none());
        assert_eq!(results.status(), Some(Status::Success));
    }

    #[test]
    fn append_splices_and_accumulates_duration() {
        let mut first = Results::new();
        first.add(node(Op::Put, Status::Success));
        first.add_duration(Duration::from_millis(5));

        let mut second = Results::new();
        second.add(node(Op::Get, Status::Error));
        second.add_duration(Duration::from_millis(7));

        first.append(second);
        assert_eq!(first.size(), 2);
        assert_eq!(first.duration(), Duration::from_millis(12));
    }
}

mod session {
    use super::*;

    #[test]
    fn open_rejects_mesh_configs() {
        let mut config = Config::default();
        config.transport.kind = TransportKind::Mesh;
        assert!(Session::open(config).is_err());
    }

    #[test]
    fn open_one_forces_a_single_local_datastore() {
        let mut config = Config::default();
        config.client_ratio = 5;
        config.server_ratio = 3;
        config.datastores_per_server = 4;

        let session = Session::open_one(config, "solo").unwrap();
        assert_eq!(session.total_datastores(), 1);
        assert!(session.is_range_server());
        session.close();
    }

    #[test]
    fn invalid_arguments_never_queue() {
        let session = Session::open(Config::default()).unwrap();

        assert!(session
            .put(Blob::empty(DataType::Byte), byte_blob(b"p"), byte_blob(b"o"))
            .is_err());
        assert!(session
            .put(byte_blob(b"s"), Blob::empty(DataType::Byte), byte_blob(b"o"))
            .is_err());
        assert!(session
            .get(byte_blob(b"s"), Blob::empty(DataType::Byte), DataType::Byte)
            .is_err());
        assert!(session
            .get_op(
                byte_blob(b"s"),
                byte_blob(b"p"),
                DataType::Byte,
                0,
                wire::GetOpKind::Next
            )
            .is_err());
        assert!(session.histogram(99, "latency").is_err());
        assert!(session.histogram(0, "").is_err());

        let results = session.flush();
        assert_eq!(results.size(), 0);
        session.close();
    }

    #[test]
    fn rocksdb_configs_need_the_feature() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.datastore.kind = DatastoreKind::RocksDb;
        config.datastore.prefix = dir.path().join("db").to_string_lossy().into_owned();

        let opened = Session::open(config);
        if cfg!(feature = "rocksdb") {
            assert!(opened.is_ok());
        } else {
            assert!(opened.is_err());
        }
    }
}
