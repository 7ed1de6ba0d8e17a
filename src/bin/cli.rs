// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! A line-driven demo against a single-rank in-memory world:
//!
//! ```text
//! PUT <subject> <predicate> <object>
//! GET <subject> <predicate>
//! DEL <subject> <predicate>
//! FLUSH
//! STATS
//! ```
//!
//! Operations queue until FLUSH, which prints one line per result node.

use std::io::{self, BufRead, Write};

use blob::{Blob, DataType};
use trellis::{Config, Op, Results, Session, Status};

fn byte_blob(raw: &str) -> Blob {
    Blob::owned(raw.as_bytes().to_vec(), DataType::Byte)
}

fn print_results(results: &mut Results) {
    results.go_to_head();
    while results.valid() {
        let status = match results.status() {
            Some(Status::Success) => "ok",
            _ => "err",
        };
        let op = results.op().expect("the cursor is valid");
        let subject = results
            .subject()
            .map(|blob| String::from_utf8_lossy(blob.data()).into_owned())
            .unwrap_or_default();
        let object = results
            .object()
            .map(|blob| String::from_utf8_lossy(blob.data()).into_owned());
        match (op, object) {
            (Op::Get, Some(object)) => println!("{op} {subject} -> {object} [{status}]"),
            _ => println!("{op} {subject} [{status}]"),
        }
        results.go_to_next();
    }
    println!("{} result(s) in {:?}", results.size(), results.duration());
}

fn run(session: &Session, line: &str) -> Result<(), String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        [] => Ok(()),
        ["PUT", subject, predicate, object] => session.put(
            byte_blob(subject),
            byte_blob(predicate),
            byte_blob(object),
        ),
        ["GET", subject, predicate] => {
            session.get(byte_blob(subject), byte_blob(predicate), DataType::Byte)
        }
        ["DEL", subject, predicate] => session.delete(byte_blob(subject), byte_blob(predicate)),
        ["FLUSH"] => {
            let mut results = session.flush();
            print_results(&mut results);
            Ok(())
        }
        ["STATS"] => {
            print!("{}", session.print_stats());
            for (id, stats) in session.get_stats() {
                println!(
                    "datastore {id}: {} put(s) in {:?}, {} get(s) in {:?}",
                    stats.num_puts, stats.put_time, stats.num_gets, stats.get_time
                );
            }
            Ok(())
        }
        _ => Err(format!("unrecognized command {line:?}")),
    }
}

fn main() {
    env_logger::init();

    let session = match Session::open(Config::default()) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("failed to start: {err}");
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    print!("> ");
    let _ = io::stdout().flush();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        if let Err(err) = run(&session, &line) {
            eprintln!("error: {err}");
        }
        print!("> ");
        let _ = io::stdout().flush();
    }

    session.close();
}
