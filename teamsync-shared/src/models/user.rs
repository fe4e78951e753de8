/// User model
///
/// A user carries a cached [`Role`]. The cache is derived state:
///
/// - `admin` when explicitly granted (orthogonal to team state)
/// - `team-leader` when the user currently leads at least one team
/// - `member` otherwise
///
/// Only the role engine ([`crate::roles`]) and the explicit admin action in
/// [`crate::accounts`] write it.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('member', 'team-leader', 'admin');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY,
///     name TEXT NOT NULL,
///     email TEXT NOT NULL UNIQUE,
///     role user_role NOT NULL DEFAULT 'member',
///     is_online BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// The user's team set is not a column: it is read back from `team_members`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::ids::{TeamId, UserId};

/// Three-tier role hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Regular user; may assign work to teams they belong to
    Member,

    /// Leads at least one team; may assign to members of led teams
    TeamLeader,

    /// Superuser flag, never implied by team state
    Admin,
}

impl Role {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::TeamLeader => "team-leader",
            Role::Admin => "admin",
        }
    }

    /// Whether this role can manage teams and grant roles
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Whether this role may assign tasks to individual users at all
    ///
    /// Team leaders are further restricted to members of the teams they lead.
    pub fn can_assign_individuals(&self) -> bool {
        !matches!(self, Role::Member)
    }

    /// Checks if this role ranks at least as high as `required`
    ///
    /// Hierarchy: Admin > TeamLeader > Member
    pub fn has_permission(&self, required: &Role) -> bool {
        self.permission_level() >= required.permission_level()
    }

    fn permission_level(&self) -> u8 {
        match self {
            Role::Admin => 3,
            Role::TeamLeader => 2,
            Role::Member => 1,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User account as seen by the core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID
    pub id: UserId,

    /// Display name
    pub name: String,

    /// Email address (unique)
    pub email: String,

    /// Cached role
    pub role: Role,

    /// Teams this user belongs to (back-reference of `Team::members`)
    pub teams: BTreeSet<TeamId>,

    /// Whether at least one real-time session is live
    pub is_online: bool,

    /// When the account was registered
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Builds a freshly registered user: member, offline, no teams
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            email: email.into(),
            role: Role::Member,
            teams: BTreeSet::new(),
            is_online: false,
            created_at: Utc::now(),
        }
    }

    /// Same as [`User::new`] with the admin flag granted
    pub fn new_admin(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            role: Role::Admin,
            ..Self::new(name, email)
        }
    }

    /// Whether this user belongs to the team
    pub fn belongs_to(&self, team_id: TeamId) -> bool {
        self.teams.contains(&team_id)
    }
}
