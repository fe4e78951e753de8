/// Persistence boundary
///
/// The core never talks to a database directly. Every operation opens one
/// [`StoreTx`], does all of its reads and writes through it, and commits at
/// the end. Dropping a transaction without calling [`StoreTx::commit`]
/// discards every write made through it, which is how an invariant
/// violation or a failed precondition aborts a multi-entity mutation.
///
/// Implementations must provide serializable isolation: two transactions
/// that touch the same team or user either run one after the other or one
/// of them fails with [`StoreError::Serialization`] and is retried.
///
/// # Implementations
///
/// - [`memory::InMemoryStore`]: a single lock over the whole state
/// - [`postgres::PgStore`]: PostgreSQL with `SERIALIZABLE` transactions

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::models::{Notification, NotificationId, Task, TaskId, Team, TeamId, User, UserId};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Concurrent transaction conflict; the whole unit of work may be retried
    #[error("serialization failure, transaction must be retried")]
    Serialization,

    /// Unique constraint violated
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Any other backend failure
    #[error("backend error: {0}")]
    Backend(String),
}

/// Factory for units of work
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a serializable transaction
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    /// Cheap connectivity check used by the health endpoint
    async fn ping(&self) -> StoreResult<()>;
}

/// One unit of work
///
/// `update_*` methods on an absent row are no-ops; callers load before they
/// write.
#[async_trait]
pub trait StoreTx: Send {
    /// Loads a user with their team set
    async fn user(&mut self, id: UserId) -> StoreResult<Option<User>>;

    /// Loads a user by email
    async fn user_by_email(&mut self, email: &str) -> StoreResult<Option<User>>;

    /// Lists all users ordered by id
    async fn users(&mut self) -> StoreResult<Vec<User>>;

    /// Inserts a new user
    async fn insert_user(&mut self, user: &User) -> StoreResult<()>;

    /// Writes a user's name, role, and presence flag, plus the team set on
    /// backends that store it on the user (PostgreSQL derives it from
    /// `team_members` instead)
    async fn update_user(&mut self, user: &User) -> StoreResult<()>;

    /// Loads a team
    async fn team(&mut self, id: TeamId) -> StoreResult<Option<Team>>;

    /// Loads a team by its unique name
    async fn team_by_name(&mut self, name: &str) -> StoreResult<Option<Team>>;

    /// Lists all teams ordered by id
    async fn teams(&mut self) -> StoreResult<Vec<Team>>;

    /// Lists the teams a user currently leads, as seen inside this transaction
    async fn teams_led_by(&mut self, user_id: UserId) -> StoreResult<Vec<Team>>;

    /// Inserts a new team with its members
    async fn insert_team(&mut self, team: &Team) -> StoreResult<()>;

    /// Writes a team's leader and member list
    async fn update_team(&mut self, team: &Team) -> StoreResult<()>;

    /// Deletes a team and its membership rows
    async fn delete_team(&mut self, id: TeamId) -> StoreResult<()>;

    /// Loads a task
    async fn task(&mut self, id: TaskId) -> StoreResult<Option<Task>>;

    /// Lists all tasks ordered by creation time
    async fn tasks(&mut self) -> StoreResult<Vec<Task>>;

    /// Lists tasks whose team set contains `team_id`
    async fn tasks_for_team(&mut self, team_id: TeamId) -> StoreResult<Vec<Task>>;

    /// Inserts a new task
    async fn insert_task(&mut self, task: &Task) -> StoreResult<()>;

    /// Writes every mutable field of a task
    async fn update_task(&mut self, task: &Task) -> StoreResult<()>;

    /// Deletes a task
    async fn delete_task(&mut self, id: TaskId) -> StoreResult<()>;

    /// Persists a notification
    async fn insert_notification(&mut self, notification: &Notification) -> StoreResult<()>;

    /// Loads a notification
    async fn notification(&mut self, id: NotificationId) -> StoreResult<Option<Notification>>;

    /// Lists a recipient's notifications, newest first
    async fn notifications_for(
        &mut self,
        recipient: UserId,
        limit: usize,
    ) -> StoreResult<Vec<Notification>>;

    /// Writes a notification's read flag
    async fn update_notification(&mut self, notification: &Notification) -> StoreResult<()>;

    /// Deletes a notification
    async fn delete_notification(&mut self, id: NotificationId) -> StoreResult<()>;

    /// Makes every write of this transaction durable
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
