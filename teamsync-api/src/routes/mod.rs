/// API route handlers
///
/// Organized by resource:
///
/// - `health`: Health check endpoint
/// - `users`: Registration, directory, admin flag
/// - `teams`: Team structure
/// - `tasks`: Tasks
/// - `notifications`: Inbox
/// - `realtime`: WebSocket push channel

pub mod health;
pub mod notifications;
pub mod realtime;
pub mod tasks;
pub mod teams;
pub mod users;
