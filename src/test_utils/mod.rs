//! Test-only helpers shared across unit and integration tests.
//!
//! Compiled for unit tests and, through the `test-util` feature, for the
//! integration tests under `tests/`.

mod collecting_handler;
mod memory_dialer;

pub use collecting_handler::CollectingHandler;
pub use memory_dialer::{MemoryDialer, WriteOutcome};
