//! logbook - activity gateway for Mon journal de bord
//!
//! Serves token-gated learning activities to end users embedded in
//! third-party e-learning players:
//!
//! - **Token codec**: opaque encrypted tokens binding {source, project,
//!   activity}
//! - **Identity**: pseudonymous subjects ("backpacks") correlated by an
//!   encrypted cookie, recognized across devices via player-supplied hints
//! - **Profile**: read-only activity bundles behind an ordered precondition
//!   chain (maintenance, authorization, subscription, publication, expiry)
//! - **Answers**: at most one current answer per (subject, project,
//!   activity), sanitized before encryption at rest

pub mod config;
pub mod crypto;
pub mod db;
pub mod ratelimit;
pub mod routes;
pub mod sanitize;
pub mod server;
pub mod services;
pub mod token;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{LogbookError, Result};
