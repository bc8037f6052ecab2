//! User administration on top of the credential directory.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use keystone_core::StoreError;

use crate::directory::CredentialDirectory;
use crate::error::{AuthError, AuthResult};
use crate::registry::RoleRegistry;
use crate::roles::RoleView;
use crate::token::TokenService;
use crate::user::{TokenInvalidationReason, User, UserStatus};

const READING_USER: &str = "TECHNICAL_MESSAGE_READING_USER";
const CREATING_USER: &str = "TECHNICAL_MESSAGE_CREATING_USER";
const UPDATING_USER: &str = "TECHNICAL_MESSAGE_UPDATING_USER";

const USER_NOT_FOUND: &str = "USER_MESSAGE_USER_NOT_FOUND";

/// A user together with the roles they hold.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub user: User,
    pub roles: Vec<RoleView>,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub nickname: Option<String>,
    pub password: Option<String>,
    pub roles: Vec<String>,
}

/// Fields left as `None` are not changed.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub status: Option<UserStatus>,
    pub roles: Option<Vec<String>>,
}

pub struct AccountService {
    directory: Arc<dyn CredentialDirectory>,
    registry: Arc<RoleRegistry>,
    tokens: Arc<TokenService>,
}

impl AccountService {
    pub fn new(
        directory: Arc<dyn CredentialDirectory>,
        registry: Arc<RoleRegistry>,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            directory,
            registry,
            tokens,
        }
    }

    fn account(&self, user: User) -> AuthResult<UserAccount> {
        let roles = self.registry.roles_for_user(user.id)?;
        Ok(UserAccount { user, roles })
    }

    fn email_taken_by_other(&self, email: &str, user: Option<&User>) -> AuthResult<bool> {
        let holder = self
            .directory
            .find_by_email(email)
            .map_err(|e| AuthError::store(READING_USER, e))?;
        Ok(match (holder, user) {
            (Some(holder), Some(user)) => holder.id != user.id,
            (Some(_), None) => true,
            (None, _) => false,
        })
    }

    pub fn list_users(&self) -> AuthResult<Vec<UserAccount>> {
        self.directory
            .list_users()
            .map_err(|e| AuthError::store(READING_USER, e))?
            .into_iter()
            .map(|u| self.account(u))
            .collect()
    }

    pub fn find_user_by_name(&self, username: &str) -> AuthResult<UserAccount> {
        let user = self.find(username)?;
        self.account(user)
    }

    fn find(&self, username: &str) -> AuthResult<User> {
        self.directory
            .find_by_username(username)
            .map_err(|e| AuthError::store(READING_USER, e))?
            .ok_or_else(|| AuthError::not_found(USER_NOT_FOUND, username))
    }

    /// Create a user. New accounts start `EXPIRED` until an administrator
    /// activates them.
    pub fn create_user(&self, new: NewUser, now: DateTime<Utc>) -> AuthResult<UserAccount> {
        if new.username.trim().is_empty() {
            return Err(AuthError::bad_request("USER_MESSAGE_USERNAME_REQUIRED"));
        }
        if new.email.trim().is_empty() {
            return Err(AuthError::bad_request("USER_MESSAGE_EMAIL_REQUIRED"));
        }

        let existing = self
            .directory
            .find_by_username(&new.username)
            .map_err(|e| AuthError::store(READING_USER, e))?;
        if existing.is_some() {
            return Err(AuthError::bad_request("USER_MESSAGE_USER_NAME_ALREADY_EXISTS"));
        }
        if self.email_taken_by_other(&new.email, None)? {
            return Err(AuthError::bad_request("USER_MESSAGE_EMAIL_ALREADY_USE"));
        }
        self.registry.ensure_roles_exist(&new.roles)?;

        let mut user = User::new(new.username, new.email, now);
        user.nickname = new.nickname;
        let mut user = self.directory.create(user).map_err(|e| match e {
            StoreError::Validation(errors) => AuthError::BadRequest {
                user_message: "USER_MESSAGE_USER_CREATION_FAILED".to_string(),
                technical_message: errors.join("; "),
            },
            other => AuthError::store(CREATING_USER, other),
        })?;

        if let Some(password) = new.password.filter(|p| !p.is_empty()) {
            user = self
                .directory
                .set_password(user.id, &password, now)
                .map_err(|e| AuthError::store(UPDATING_USER, e))?;
        }
        if !new.roles.is_empty() {
            self.directory
                .add_to_roles(user.id, &new.roles)
                .map_err(|e| AuthError::store(UPDATING_USER, e))?;
        }

        info!(user = %user.username, roles = ?new.roles, "created user");
        self.account(user)
    }

    /// Apply `changes` to an existing user. Once the request is valid the
    /// user's sessions are revoked with `USER_MODIFIED`, even when nothing
    /// changed. A rejected request leaves the user and their sessions as-is.
    pub fn modify_user(&self, username: &str, changes: UserChanges) -> AuthResult<UserAccount> {
        let user = self.find(username)?;

        if let Some(email) = &changes.email {
            if email.trim().is_empty() {
                return Err(AuthError::bad_request("USER_MESSAGE_EMAIL_REQUIRED"));
            }
            if self.email_taken_by_other(email, Some(&user))? {
                return Err(AuthError::bad_request("USER_MESSAGE_EMAIL_ALREADY_USE"));
            }
        }
        if let Some(roles) = &changes.roles {
            self.registry.ensure_roles_exist(roles)?;
        }

        self.tokens
            .revoke(&user, TokenInvalidationReason::UserModified)?;

        let mut user = self
            .directory
            .find_by_id(user.id)
            .map_err(|e| AuthError::store(READING_USER, e))?
            .ok_or_else(|| AuthError::not_found(USER_NOT_FOUND, username))?;

        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(nickname) = changes.nickname {
            user.nickname = Some(nickname).filter(|n| !n.is_empty());
        }
        if let Some(status) = changes.status {
            if user.status == UserStatus::Locked && status != UserStatus::Locked {
                user.lockout_end = None;
                user.access_failed_count = 0;
            }
            user.status = status;
        }

        let user = self
            .directory
            .update(user)
            .map_err(|e| AuthError::store(UPDATING_USER, e))?;
        info!(user = %user.username, status = %user.status, "modified user");

        if let Some(roles) = changes.roles {
            let roles = self.registry.modify_user_roles(&user, &roles)?;
            // Role changes may have rotated the stamps again.
            let user = self
                .directory
                .find_by_id(user.id)
                .map_err(|e| AuthError::store(READING_USER, e))?
                .unwrap_or(user);
            return Ok(UserAccount { user, roles });
        }
        self.account(user)
    }

    /// Replace the user's password and revoke their sessions.
    pub fn set_password(&self, username: &str, password: &str, now: DateTime<Utc>) -> AuthResult<User> {
        if password.is_empty() {
            return Err(AuthError::bad_request("USER_MESSAGE_PASSWORD_REQUIRED"));
        }
        let user = self.find(username)?;
        let user = self
            .directory
            .set_password(user.id, password, now)
            .map_err(|e| AuthError::store(UPDATING_USER, e))?;
        self.tokens
            .revoke(&user, TokenInvalidationReason::UserModified)?;

        info!(user = %user.username, "password changed");
        self.directory
            .find_by_id(user.id)
            .map_err(|e| AuthError::store(READING_USER, e))?
            .ok_or_else(|| AuthError::not_found(USER_NOT_FOUND, username))
    }
}
