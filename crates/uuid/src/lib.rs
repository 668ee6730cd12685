//! Identifier utilities for the telecare workspace.
//!
//! Two identifier shapes are used across the system:
//!
//! - [`ShardableUuid`]: a UUID held in *canonical* form (32 lowercase hex characters, no
//!   hyphens). Consultation, person, membership and actor identifiers all use this shape so that
//!   the file-backed store can derive sharded directory locations deterministically.
//! - [`TimestampId`]: a time-prefixed identifier (`YYYYMMDDTHHMMSS.mmmZ-<canonical uuid>`) used
//!   to key append-only entries such as addenda and audit events. The string form sorts in
//!   chronological order.
//!
//! ## Sharded directory layout
//! For a canonical UUID `u`, records live under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! Example:
//! `telecare_data/consultations/55/0e/550e8400e29b41d4a716446655440000/`

mod service;

pub use service::{ShardableUuid, TimestampId, TimestampIdGenerator, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
