/// PostgreSQL store
///
/// Every unit of work runs at `SERIALIZABLE` isolation. When PostgreSQL
/// detects a conflicting concurrent transaction (SQLSTATE `40001`, or a
/// deadlock `40P01`) the error surfaces as [`StoreError::Serialization`]
/// and the calling service retries the whole operation.
///
/// The user's team set is never stored on `users`; it is read back from
/// `team_members`, so writing a team's member list updates both sides of
/// the relation in the same statement set.
///
/// # Example
///
/// ```no_run
/// use teamsync_shared::db::pool::{create_pool, DatabaseConfig};
/// use teamsync_shared::store::{PgStore, Store};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
///
/// let store = PgStore::new(pool);
/// store.ping().await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, Postgres};
use sqlx::types::Json;
use sqlx::Transaction;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use super::{Store, StoreError, StoreResult, StoreTx};
use crate::models::{
    Notification, NotificationId, NotificationKind, Role, Task, TaskId, TaskStatus, Team, TeamId,
    User, UserId,
};

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some("40001") | Some("40P01") => return StoreError::Serialization,
                _ => {}
            }
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation(
                    db_err.constraint().unwrap_or("unknown").to_string(),
                );
            }
        }
        StoreError::Backend(err.to_string())
    }
}

/// Store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wraps an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    role: Role,
    is_online: bool,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self, teams: BTreeSet<TeamId>) -> User {
        User {
            id: self.id.into(),
            name: self.name,
            email: self.email,
            role: self.role,
            teams,
            is_online: self.is_online,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TeamRow {
    id: Uuid,
    name: String,
    owner_id: Uuid,
    leader_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TeamRow {
    fn into_team(self, members: Vec<UserId>) -> Team {
        Team {
            id: self.id.into(),
            name: self.name,
            owner: self.owner_id.into(),
            leader: self.leader_id.map(UserId::from),
            members,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    deadline: Option<DateTime<Utc>>,
    status: TaskStatus,
    assigned_to: Vec<Uuid>,
    team_ids: Vec<Uuid>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id.into(),
            title: row.title,
            description: row.description,
            deadline: row.deadline,
            status: row.status,
            assigned_to: row.assigned_to.into_iter().map(UserId::from).collect(),
            teams: row.team_ids.into_iter().map(TeamId::from).collect(),
            created_by: row.created_by.into(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    recipient_id: Uuid,
    sender_id: Option<Uuid>,
    kind: Json<NotificationKind>,
    message: String,
    read: bool,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id.into(),
            recipient: row.recipient_id.into(),
            sender: row.sender_id.map(UserId::from),
            kind: row.kind.0,
            message: row.message,
            read: row.read,
            created_at: row.created_at,
        }
    }
}

const USER_COLUMNS: &str = "id, name, email, role, is_online, created_at";
const TEAM_COLUMNS: &str = "id, name, owner_id, leader_id, created_at";
const TASK_COLUMNS: &str =
    "id, title, description, deadline, status, assigned_to, team_ids, created_by, created_at, updated_at";
const NOTIFICATION_COLUMNS: &str = "id, recipient_id, sender_id, kind, message, read, created_at";

fn uuids<I, T>(ids: I) -> Vec<Uuid>
where
    I: IntoIterator<Item = T>,
    T: Into<Uuid>,
{
    ids.into_iter().map(Into::into).collect()
}

impl PgTx {
    async fn team_set(&mut self, user_id: Uuid) -> StoreResult<BTreeSet<TeamId>> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT team_id FROM team_members WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&mut *self.tx)
                .await?;
        Ok(ids.into_iter().map(TeamId::from).collect())
    }

    async fn member_list(&mut self, team_id: Uuid) -> StoreResult<Vec<UserId>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM team_members WHERE team_id = $1 ORDER BY seq ASC",
        )
        .bind(team_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(ids.into_iter().map(UserId::from).collect())
    }

    async fn hydrate_teams(&mut self, rows: Vec<TeamRow>) -> StoreResult<Vec<Team>> {
        let mut teams = Vec::with_capacity(rows.len());
        for row in rows {
            let members = self.member_list(row.id).await?;
            teams.push(row.into_team(members));
        }
        Ok(teams)
    }

    async fn insert_members(&mut self, team_id: Uuid, members: &[UserId]) -> StoreResult<()> {
        for member in members {
            sqlx::query(
                r#"
                INSERT INTO team_members (team_id, user_id)
                VALUES ($1, $2)
                ON CONFLICT (team_id, user_id) DO NOTHING
                "#,
            )
            .bind(team_id)
            .bind(member.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => {
                let teams = self.team_set(row.id).await?;
                Ok(Some(row.into_user(teams)))
            }
            None => Ok(None),
        }
    }

    async fn user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => {
                let teams = self.team_set(row.id).await?;
                Ok(Some(row.into_user(teams)))
            }
            None => Ok(None),
        }
    }

    async fn users(&mut self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id ASC"
        ))
        .fetch_all(&mut *self.tx)
        .await?;

        let pairs: Vec<(Uuid, Uuid)> =
            sqlx::query_as("SELECT user_id, team_id FROM team_members")
                .fetch_all(&mut *self.tx)
                .await?;
        let mut by_user: HashMap<Uuid, BTreeSet<TeamId>> = HashMap::new();
        for (user_id, team_id) in pairs {
            by_user.entry(user_id).or_default().insert(team_id.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let teams = by_user.remove(&row.id).unwrap_or_default();
                row.into_user(teams)
            })
            .collect())
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, role, is_online, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.is_online)
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> StoreResult<()> {
        sqlx::query("UPDATE users SET name = $2, role = $3, is_online = $4 WHERE id = $1")
            .bind(user.id.as_uuid())
            .bind(&user.name)
            .bind(user.role)
            .bind(user.is_online)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn team(&mut self, id: TeamId) -> StoreResult<Option<Team>> {
        let row = sqlx::query_as::<_, TeamRow>(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => {
                let members = self.member_list(row.id).await?;
                Ok(Some(row.into_team(members)))
            }
            None => Ok(None),
        }
    }

    async fn team_by_name(&mut self, name: &str) -> StoreResult<Option<Team>> {
        let row = sqlx::query_as::<_, TeamRow>(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => {
                let members = self.member_list(row.id).await?;
                Ok(Some(row.into_team(members)))
            }
            None => Ok(None),
        }
    }

    async fn teams(&mut self) -> StoreResult<Vec<Team>> {
        let rows = sqlx::query_as::<_, TeamRow>(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams ORDER BY id ASC"
        ))
        .fetch_all(&mut *self.tx)
        .await?;
        self.hydrate_teams(rows).await
    }

    async fn teams_led_by(&mut self, user_id: UserId) -> StoreResult<Vec<Team>> {
        let rows = sqlx::query_as::<_, TeamRow>(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE leader_id = $1 ORDER BY id ASC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        self.hydrate_teams(rows).await
    }

    async fn insert_team(&mut self, team: &Team) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO teams (id, name, owner_id, leader_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(team.id.as_uuid())
        .bind(&team.name)
        .bind(team.owner.as_uuid())
        .bind(team.leader.map(Uuid::from))
        .bind(team.created_at)
        .execute(&mut *self.tx)
        .await?;

        self.insert_members(team.id.as_uuid(), &team.members).await
    }

    async fn update_team(&mut self, team: &Team) -> StoreResult<()> {
        sqlx::query("UPDATE teams SET leader_id = $2 WHERE id = $1")
            .bind(team.id.as_uuid())
            .bind(team.leader.map(Uuid::from))
            .execute(&mut *self.tx)
            .await?;

        sqlx::query("DELETE FROM team_members WHERE team_id = $1 AND NOT (user_id = ANY($2))")
            .bind(team.id.as_uuid())
            .bind(uuids(team.members.iter().copied()))
            .execute(&mut *self.tx)
            .await?;

        self.insert_members(team.id.as_uuid(), &team.members).await
    }

    async fn delete_team(&mut self, id: TeamId) -> StoreResult<()> {
        sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn task(&mut self, id: TaskId) -> StoreResult<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Task::from))
    }

    async fn tasks(&mut self) -> StoreResult<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at ASC"
        ))
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn tasks_for_team(&mut self, team_id: TeamId) -> StoreResult<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE $1 = ANY(team_ids) ORDER BY created_at ASC"
        ))
        .bind(team_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn insert_task(&mut self, task: &Task) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, title, description, deadline, status, assigned_to, team_ids,
                               created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(task.id.as_uuid())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.deadline)
        .bind(task.status)
        .bind(uuids(task.assigned_to.iter().copied()))
        .bind(uuids(task.teams.iter().copied()))
        .bind(task.created_by.as_uuid())
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_task(&mut self, task: &Task) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE tasks
            SET title = $2, description = $3, deadline = $4, status = $5,
                assigned_to = $6, team_ids = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(task.id.as_uuid())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.deadline)
        .bind(task.status)
        .bind(uuids(task.assigned_to.iter().copied()))
        .bind(uuids(task.teams.iter().copied()))
        .bind(task.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_task(&mut self, id: TaskId) -> StoreResult<()> {
        sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_notification(&mut self, notification: &Notification) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient_id, sender_id, kind, type, message, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(notification.id.as_uuid())
        .bind(notification.recipient.as_uuid())
        .bind(notification.sender.map(Uuid::from))
        .bind(Json(&notification.kind))
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn notification(&mut self, id: NotificationId) -> StoreResult<Option<Notification>> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Notification::from))
    }

    async fn notifications_for(
        &mut self,
        recipient: UserId,
        limit: usize,
    ) -> StoreResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE recipient_id = $1
             ORDER BY created_at DESC
             LIMIT $2"
        ))
        .bind(recipient.as_uuid())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn update_notification(&mut self, notification: &Notification) -> StoreResult<()> {
        sqlx::query("UPDATE notifications SET read = $2 WHERE id = $1")
            .bind(notification.id.as_uuid())
            .bind(notification.read)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_notification(&mut self, id: NotificationId) -> StoreResult<()> {
        sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
