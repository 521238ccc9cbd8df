//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain ports (use-cases) and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{ProgressionCommand, ProgressionQuery};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Attempt lifecycle commands.
    pub progression: Arc<dyn ProgressionCommand>,
    /// Progression queries.
    pub progression_query: Arc<dyn ProgressionQuery>,
}

impl HttpState {
    /// Bundle the port implementations handlers depend on.
    pub fn new(
        progression: Arc<dyn ProgressionCommand>,
        progression_query: Arc<dyn ProgressionQuery>,
    ) -> Self {
        Self {
            progression,
            progression_query,
        }
    }
}
