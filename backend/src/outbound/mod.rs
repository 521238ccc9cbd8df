//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! This module follows the hexagonal architecture pattern, providing
//! concrete implementations of domain port traits:
//!
//! - **persistence**: versioned document store adapters and write-time
//!   sanitisation.
//! - **events**: sinks handing committed progression events to the
//!   notification-delivery subsystem.
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod events;
pub mod persistence;
