//! An in-memory [`Dialer`] that records every batch it receives.
//!
//! Failures are scripted: a number of dials can be made to fail, individual
//! writes can be told to fail, or the whole endpoint can be marked down.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde_json::Value;

use crate::shipper::{Connection, Dialer};

/// Scripted result for the next write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Ok,
    Fail,
}

#[derive(Default)]
struct State {
    failing_dials: usize,
    down: bool,
    dials: usize,
    writes: VecDeque<WriteOutcome>,
    write_delay: Duration,
    batches: Vec<Vec<u8>>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    written: Condvar,
}

/// Dialer whose connections append to a shared in-memory log.
#[derive(Clone, Default)]
pub struct MemoryDialer {
    shared: Arc<Shared>,
}

impl MemoryDialer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` dials fail.
    pub fn fail_next_dials(&self, count: usize) {
        self.shared.state.lock().failing_dials = count;
    }

    /// Fail every dial and write while `down` is true.
    pub fn set_down(&self, down: bool) {
        self.shared.state.lock().down = down;
    }

    /// Queue outcomes for the next writes; unscripted writes succeed.
    pub fn script_writes(&self, outcomes: impl IntoIterator<Item = WriteOutcome>) {
        self.shared.state.lock().writes.extend(outcomes);
    }

    /// Sleep this long inside every write.
    pub fn set_write_delay(&self, delay: Duration) {
        self.shared.state.lock().write_delay = delay;
    }

    pub fn dial_count(&self) -> usize {
        self.shared.state.lock().dials
    }

    /// Number of successful batch writes.
    pub fn batch_count(&self) -> usize {
        self.shared.state.lock().batches.len()
    }

    /// Payloads of every successful write, in order.
    pub fn batches(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().batches.clone()
    }

    /// Every byte received so far.
    pub fn received(&self) -> Vec<u8> {
        self.shared.state.lock().batches.concat()
    }

    /// Every received line decoded as JSON.
    pub fn received_entries(&self) -> Vec<Value> {
        let bytes = self.received();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|line| !line.is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Block until at least `count` entries arrived or `timeout` elapsed.
    pub fn wait_for_entries(&self, count: usize, timeout: Duration) -> Vec<Value> {
        let deadline = std::time::Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            let lines = state
                .batches
                .iter()
                .map(|b| b.iter().filter(|&&byte| byte == b'\n').count())
                .sum::<usize>();
            if lines >= count {
                break;
            }
            if self
                .shared
                .written
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                break;
            }
        }
        drop(state);
        self.received_entries()
    }
}

impl Dialer for MemoryDialer {
    fn dial(&self, _timeout: Duration) -> io::Result<Box<dyn Connection>> {
        let mut state = self.shared.state.lock();
        state.dials += 1;
        if state.down {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "endpoint down"));
        }
        if state.failing_dials > 0 {
            state.failing_dials -= 1;
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "scripted dial failure"));
        }
        Ok(Box::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn target(&self) -> &str {
        "memory"
    }
}

struct MemoryConnection {
    shared: Arc<Shared>,
}

impl Connection for MemoryConnection {
    fn set_write_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let delay = self.shared.state.lock().write_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let mut state = self.shared.state.lock();
        if state.down || state.writes.pop_front() == Some(WriteOutcome::Fail) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted write failure"));
        }
        state.batches.push(buf.to_vec());
        self.shared.written.notify_all();
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
