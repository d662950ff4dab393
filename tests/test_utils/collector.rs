//! Loopback TCP endpoint that decodes newline-delimited JSON.
//!
//! Every accepted connection gets its own reader thread; decoded lines land in
//! one shared list so tests can wait for a number of entries regardless of
//! how the shipper batched or reconnected.

use std::io::{BufRead, BufReader};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

#[derive(Default)]
struct Received {
    entries: Vec<Value>,
    connections: usize,
}

#[derive(Default)]
struct Shared {
    received: Mutex<Received>,
    arrived: Condvar,
}

/// Collecting server bound to an ephemeral loopback port.
pub struct Collector {
    addr: SocketAddr,
    shared: Arc<Shared>,
}

impl Collector {
    pub fn start() -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
        let addr = listener.local_addr().expect("listener has address");
        let shared = Arc::new(Shared::default());
        let accept_shared = Arc::clone(&shared);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                accept_shared
                    .received
                    .lock()
                    .expect("collector mutex poisoned")
                    .connections += 1;
                let reader_shared = Arc::clone(&accept_shared);
                thread::spawn(move || read_lines(stream, &reader_shared));
            }
        });
        Self { addr, shared }
    }

    /// `host:port` string suitable for `ShipperConfig::address`.
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    #[allow(dead_code)]
    pub fn connections(&self) -> usize {
        self.shared
            .received
            .lock()
            .expect("collector mutex poisoned")
            .connections
    }

    /// Block until `count` entries arrived or `timeout` elapsed.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Value> {
        let deadline = Instant::now() + timeout;
        let mut received = self.shared.received.lock().expect("collector mutex poisoned");
        while received.entries.len() < count {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            received = self
                .shared
                .arrived
                .wait_timeout(received, deadline - now)
                .expect("collector mutex poisoned")
                .0;
        }
        received.entries.clone()
    }
}

fn read_lines(stream: TcpStream, shared: &Shared) {
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let Ok(line) = line else { break };
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line).expect("each line is a JSON object");
        shared
            .received
            .lock()
            .expect("collector mutex poisoned")
            .entries
            .push(value);
        shared.arrived.notify_all();
    }
}

/// Message field of every entry, in arrival order.
#[allow(dead_code)]
pub fn messages(entries: &[Value]) -> Vec<String> {
    entries
        .iter()
        .filter_map(|entry| entry["message"].as_str().map(str::to_owned))
        .collect()
}
