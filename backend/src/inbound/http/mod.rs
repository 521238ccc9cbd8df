//! HTTP inbound adapter exposing the progression REST endpoints.

pub mod auth;
pub mod challenges;
pub mod error;
pub mod health;
pub mod schemas;
pub mod state;

pub use error::ApiResult;
