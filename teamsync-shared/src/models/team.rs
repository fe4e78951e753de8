/// Team model
///
/// # Schema
///
/// ```sql
/// CREATE TABLE teams (
///     id UUID PRIMARY KEY,
///     name TEXT NOT NULL UNIQUE,
///     owner_id UUID NOT NULL REFERENCES users(id),
///     leader_id UUID REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE team_members (
///     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     seq BIGSERIAL NOT NULL,
///     PRIMARY KEY (team_id, user_id)
/// );
/// ```
///
/// `members` keeps join order; `seq` persists it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{TeamId, UserId};

/// A team of users with an optional leader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Team ID
    pub id: TeamId,

    /// Unique team name
    pub name: String,

    /// Creator of the team, immutable
    pub owner: UserId,

    /// Current leader, always one of `members` when set
    pub leader: Option<UserId>,

    /// Members in join order, no duplicates
    pub members: Vec<UserId>,

    /// When the team was created
    pub created_at: DateTime<Utc>,
}

impl Team {
    /// Builds a team with no members and no leader
    pub fn new(name: impl Into<String>, owner: UserId) -> Self {
        Self {
            id: TeamId::new(),
            name: name.into(),
            owner,
            leader: None,
            members: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Whether the user is a member
    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    /// Whether the user currently leads this team
    pub fn is_led_by(&self, user_id: UserId) -> bool {
        self.leader == Some(user_id)
    }

    /// Appends a member; returns false if already present
    pub fn add_member(&mut self, user_id: UserId) -> bool {
        if self.is_member(user_id) {
            return false;
        }
        self.members.push(user_id);
        true
    }

    /// Removes a member, clearing the leader slot if it pointed at them
    ///
    /// Returns false if the user was not a member.
    pub fn remove_member(&mut self, user_id: UserId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| *m != user_id);
        if self.leader == Some(user_id) {
            self.leader = None;
        }
        self.members.len() != before
    }

    /// Checks the structural invariants of a single team
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(leader) = self.leader {
            if !self.is_member(leader) {
                return Err(format!(
                    "team {} leader {} is not a member",
                    self.id, leader
                ));
            }
        }

        let mut seen = std::collections::HashSet::with_capacity(self.members.len());
        for member in &self.members {
            if !seen.insert(member) {
                return Err(format!("team {} lists member {} twice", self.id, member));
            }
        }

        Ok(())
    }
}
