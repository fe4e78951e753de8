/// User Accounts
///
/// Registration, user lookup, and the admin flag. Granting or revoking admin
/// recomputes the user's role and notifies them.

use std::sync::Arc;

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::events::{DomainEvent, EventKind};
use crate::invariants::check_affected;
use crate::lookup::{require_actor, require_user};
use crate::models::{Notification, Role, User, UserId};
use crate::notifications::NotificationFanout;
use crate::retry::with_retries;
use crate::roles::{role_without_admin, RoleChange};
use crate::store::{Store, StoreError};

/// User account operations
#[derive(Clone)]
pub struct Accounts {
    store: Arc<dyn Store>,
    fanout: NotificationFanout,
    config: CoreConfig,
}

fn normalize_email(email: &str) -> CoreResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(CoreError::Conflict("Email address is invalid".to_string())),
    }
}

impl Accounts {
    pub fn new(store: Arc<dyn Store>, fanout: NotificationFanout, config: CoreConfig) -> Self {
        Self {
            store,
            fanout,
            config,
        }
    }

    /// Registers a new member
    ///
    /// Emails are compared case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` for an empty name, a malformed email, or an email
    /// that is already registered.
    pub async fn register(&self, name: &str, email: &str) -> CoreResult<User> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Conflict("Name must not be empty".to_string()));
        }
        let email = normalize_email(email)?;
        let email = email.as_str();

        let user = with_retries(self.config.max_attempts, "register", move || async move {
            let mut tx = self.store.begin().await?;
            if tx.user_by_email(email).await?.is_some() {
                return Err(CoreError::Conflict("User already exists".to_string()));
            }

            let user = User::new(name, email);
            tx.insert_user(&user).await.map_err(|e| match e {
                StoreError::UniqueViolation(_) => CoreError::Conflict("User already exists".to_string()),
                other => other.into(),
            })?;
            tx.commit().await?;
            Ok(user)
        })
        .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Loads a user by id
    pub async fn get_user(&self, user_id: UserId) -> CoreResult<User> {
        with_retries(self.config.max_attempts, "get_user", move || async move {
            let mut tx = self.store.begin().await?;
            require_user(tx.as_mut(), user_id).await
        })
        .await
    }

    /// Loads a user by email, case-insensitively
    pub async fn find_by_email(&self, email: &str) -> CoreResult<User> {
        let email = email.trim().to_lowercase();
        let email = email.as_str();
        with_retries(self.config.max_attempts, "find_by_email", move || async move {
            let mut tx = self.store.begin().await?;
            tx.user_by_email(email)
                .await?
                .ok_or_else(|| CoreError::NotFound("User not found".to_string()))
        })
        .await
    }

    /// Every registered user, by name
    pub async fn list_users(&self) -> CoreResult<Vec<User>> {
        with_retries(self.config.max_attempts, "list_users", move || async move {
            let mut tx = self.store.begin().await?;
            let mut users = tx.users().await?;
            users.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
            Ok(users)
        })
        .await
    }

    /// Grants or revokes the admin flag
    ///
    /// Revoking recomputes the role from the user's current leadership, so a
    /// former admin who leads a team becomes a team leader.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the actor is an admin
    /// - `NotFound` if the user does not exist
    pub async fn set_admin(&self, actor: UserId, user_id: UserId, granted: bool) -> CoreResult<User> {
        let (user, staged) = with_retries(self.config.max_attempts, "set_admin", move || {
            self.set_admin_once(actor, user_id, granted)
        })
        .await?;

        self.fanout.deliver(&staged);
        Ok(user)
    }

    async fn set_admin_once(
        &self,
        actor_id: UserId,
        user_id: UserId,
        granted: bool,
    ) -> CoreResult<(User, Vec<Notification>)> {
        let mut tx = self.store.begin().await?;
        let actor = require_actor(tx.as_mut(), actor_id).await?;
        if !actor.role.is_admin() {
            return Err(CoreError::Forbidden(
                "Only admins can change the admin flag".to_string(),
            ));
        }
        let mut user = require_user(tx.as_mut(), user_id).await?;

        let role = if granted {
            Role::Admin
        } else {
            role_without_admin(tx.teams_led_by(user_id).await?.len())
        };
        if role == user.role {
            return Ok((user, Vec::new()));
        }

        let change = RoleChange {
            user_id,
            from: user.role,
            to: role,
        };
        user.role = role;
        tx.update_user(&user).await?;

        tracing::info!(
            user_id = %user_id,
            actor = %actor_id,
            from = %change.from,
            to = %change.to,
            "Admin flag changed"
        );

        let event = DomainEvent::new(actor.id, EventKind::RoleChanged { user_id, role });
        let staged = self.fanout.stage(tx.as_mut(), &event).await?;

        check_affected(tx.as_mut(), &[], &[user_id]).await?;
        tx.commit().await?;
        Ok((user, staged))
    }
}
