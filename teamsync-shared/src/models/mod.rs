/// Domain model for teamsync
///
/// Entity definitions and their local invariants. No persistence or
/// cross-entity behavior lives here.
///
/// # Models
///
/// - `ids`: typed identifiers
/// - `user`: users and the three-tier [`Role`]
/// - `team`: teams with owner, leader, and members
/// - `task`: tasks and their audience
/// - `notification`: persisted notifications and their wire payload
///
/// # Example
///
/// ```
/// use teamsync_shared::models::{Team, User};
///
/// let lead = User::new("Lin", "lin@example.com");
/// let mut team = Team::new("platform", lead.id);
/// team.add_member(lead.id);
/// team.leader = Some(lead.id);
/// assert!(team.validate().is_ok());
/// ```

pub mod ids;
pub mod notification;
pub mod task;
pub mod team;
pub mod user;

pub use ids::{ConnectionId, NotificationId, TaskId, TeamId, UserId};
pub use notification::{Notification, NotificationKind, NotificationPayload};
pub use task::{NewTask, Task, TaskChanges, TaskStatus};
pub use team::Team;
pub use user::{Role, User};
