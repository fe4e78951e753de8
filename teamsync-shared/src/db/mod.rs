/// PostgreSQL plumbing for teamsync
///
/// # Modules
///
/// - `pool`: connection pool with startup health check
/// - `migrations`: embedded schema migrations
///
/// The typed queries themselves live in [`crate::store::postgres`].

pub mod migrations;
pub mod pool;
