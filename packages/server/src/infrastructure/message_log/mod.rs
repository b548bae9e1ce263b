//! Message log implementations
//!
//! - `inmemory`: process-wide, unbounded, append-only history

pub mod inmemory;

pub use inmemory::InMemoryMessageLog;
