//! # TeamSync Shared Library
//!
//! Team structure, roles, tasks, and notifications, shared by the TeamSync
//! API server and the reconciliation worker.
//!
//! ## Module Organization
//!
//! - `models`: entities and their local invariants
//! - `store`: transactional persistence boundary (in-memory and PostgreSQL)
//! - `roles`: role transition engine
//! - `teams`: team membership store
//! - `tasks`: task store with team-relative authorization
//! - `accounts`: user registration and the admin flag
//! - `notifications`: fan-out and the recipient inbox
//! - `presence`: live sessions and push delivery
//! - `invariants`: cross-entity consistency checks
//! - `reconcile`: drift repair for the worker
//! - `auth`: JWT, Axum middleware, and permission checks
//! - `db`: pool and migrations
//! - `config`: core policy knobs
//! - `error`: common error types

pub mod accounts;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod invariants;
pub mod models;
pub mod notifications;
pub mod presence;
pub mod reconcile;
pub mod retry;
pub mod roles;
pub mod services;
pub mod store;
pub mod tasks;
pub mod teams;

pub(crate) mod lookup;

/// Current version of the TeamSync shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
