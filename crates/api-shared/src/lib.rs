//! # API Shared
//!
//! Shared utilities for the telecare API surfaces.
//!
//! Contains:
//! - `HealthService` and its response type
//! - Authentication utilities: API-key checking and the caller-identity header names
//!
//! Used by `api-rest` and the workspace's `telecare-run` binary.

pub mod auth;
pub mod health;

pub use health::{HealthRes, HealthService};
