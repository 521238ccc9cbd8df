//! Challenge progression and reward engine.
//!
//! The crate is laid out hexagonally: `domain` holds the entities, ports,
//! and the completion coordinator; `inbound` exposes the HTTP adapter;
//! `outbound` provides the document store and event sink adapters.

pub mod domain;
pub mod inbound;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
