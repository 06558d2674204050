//! In-memory identity provider used by unit and integration tests.

pub mod memory;

pub use memory::{InMemoryIam, InMemorySession, RecordedCall, MAX_KEYS_PER_USER};
