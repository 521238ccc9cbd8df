//! Document store persistence adapters.
//!
//! The engine persists into a transactional document store with optimistic
//! per-document versioning. This module holds:
//!
//! - **schema**: collection schemas and the write-time sanitiser that
//!   enforces the no-undefined rule (absent values stored as explicit null).
//! - **memory_store**: the in-memory reference adapter used by local
//!   development and the test suite. A hosted-store adapter plugs in behind
//!   the same `ProgressionStore` port.
//!
//! Adapters are thin translators between domain types and stored JSON
//! documents. They contain no business logic.

mod memory_store;
pub mod schema;

pub use memory_store::MemoryStore;
