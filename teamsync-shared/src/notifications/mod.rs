/// Notifications
///
/// - [`fanout`]: recipient computation, persistence, and push
/// - [`inbox`]: list, mark read, and delete for the recipient
///
/// Persisted order is authoritative. Two notifications produced by
/// concurrent operations may reach a client in either order; clients that
/// care re-sort by `createdAt`.

pub mod fanout;
pub mod inbox;

pub use fanout::NotificationFanout;
pub use inbox::Inbox;
