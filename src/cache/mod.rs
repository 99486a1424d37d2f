//! Cache namespace backends
//!
//! SQLite storage persists the precache and runtime namespaces between runs;
//! the in-memory store backs ephemeral runs and tests.

pub mod key;
pub mod memory;
pub mod storage;

pub use memory::MemoryCacheStore;
pub use storage::SqliteCacheStore;
