//! In-memory credential directory with an account lockout policy.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use keystone_auth::{
    AuthConfig, CredentialDirectory, PasswordVerification, TokenInvalidationReason, User,
    UserStatus,
};
use keystone_core::{StoreError, StoreResult, UserId};

use crate::password::PasswordHasher;

/// Failure counting and lockout knobs applied by `verify_password`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_failed_access_attempts: u32,
    pub lockout: Duration,
    pub require_confirmed_email: bool,
}

impl LockoutPolicy {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            max_failed_access_attempts: config.max_failed_access_attempts,
            lockout: config.lockout_duration(),
            require_confirmed_email: config.require_confirmed_email,
        }
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}

#[derive(Default)]
struct State {
    users: Vec<User>,
    memberships: HashMap<UserId, Vec<String>>,
}

impl State {
    fn position(&self, id: UserId) -> Option<usize> {
        self.users.iter().position(|u| u.id == id)
    }

    fn conflicts(&self, user: &User) -> Vec<String> {
        let mut errors = Vec::new();
        for other in self.users.iter().filter(|u| u.id != user.id) {
            if other.username.eq_ignore_ascii_case(&user.username) {
                errors.push(format!("username '{}' is already taken", user.username));
            }
            if other.email.eq_ignore_ascii_case(&user.email) {
                errors.push(format!("email '{}' is already in use", user.email));
            }
        }
        errors
    }
}

/// User records, password hashes and role memberships behind one lock.
///
/// Usernames and emails compare case-insensitively.
pub struct InMemoryCredentialDirectory {
    state: RwLock<State>,
    hasher: PasswordHasher,
    policy: LockoutPolicy,
}

impl InMemoryCredentialDirectory {
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            state: RwLock::new(State::default()),
            hasher: PasswordHasher::new(),
            policy,
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::unavailable("credential directory lock poisoned"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::unavailable("credential directory lock poisoned"))
    }

    fn modify<F>(&self, id: UserId, f: F) -> StoreResult<User>
    where
        F: FnOnce(&mut User),
    {
        let mut state = self.write()?;
        let idx = state
            .position(id)
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))?;
        f(&mut state.users[idx]);
        Ok(state.users[idx].clone())
    }

    fn record_failure(&self, id: UserId, now: DateTime<Utc>) -> StoreResult<PasswordVerification> {
        let policy = self.policy;
        let mut locked = false;
        let user = self.modify(id, |user| {
            user.access_failed_count += 1;
            if user.access_failed_count >= policy.max_failed_access_attempts {
                user.lockout_end = Some(
                    now.checked_add_signed(policy.lockout)
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                );
                user.access_failed_count = 0;
                locked = true;
            }
        })?;

        if locked {
            warn!(user = %user.username, "lockout threshold reached");
            Ok(PasswordVerification::LockedOut)
        } else {
            debug!(user = %user.username, failures = user.access_failed_count, "password mismatch");
            Ok(PasswordVerification::Failed)
        }
    }
}

impl Default for InMemoryCredentialDirectory {
    fn default() -> Self {
        Self::new(LockoutPolicy::default())
    }
}

impl CredentialDirectory for InMemoryCredentialDirectory {
    fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.iter().find(|u| u.id == id).cloned())
    }

    fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.read()?.users.clone())
    }

    fn create(&self, user: User) -> StoreResult<User> {
        let mut state = self.write()?;
        if state.position(user.id).is_some() {
            return Err(StoreError::validation(format!("user {} already exists", user.id)));
        }
        let errors = state.conflicts(&user);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }
        state.users.push(user.clone());
        Ok(user)
    }

    fn update(&self, user: User) -> StoreResult<User> {
        let mut state = self.write()?;
        let idx = state
            .position(user.id)
            .ok_or_else(|| StoreError::not_found(format!("user {}", user.id)))?;
        if state.users[idx].security_stamp != user.security_stamp {
            return Err(StoreError::conflict(format!(
                "user {} was revoked since it was read",
                user.id
            )));
        }
        let errors = state.conflicts(&user);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }
        state.users[idx] = user.clone();
        Ok(user)
    }

    fn rotate_stamps(&self, id: UserId, reason: TokenInvalidationReason) -> StoreResult<User> {
        self.modify(id, |user| {
            user.rotate_stamps(reason);
        })
    }

    fn touch(&self, id: UserId, now: DateTime<Utc>) -> StoreResult<User> {
        self.modify(id, |user| user.touch(now))
    }

    fn set_status(&self, id: UserId, status: UserStatus) -> StoreResult<User> {
        self.modify(id, |user| user.status = status)
    }

    fn set_password(&self, id: UserId, plaintext: &str, now: DateTime<Utc>) -> StoreResult<User> {
        let hash = self.hasher.hash(plaintext)?;
        self.modify(id, |user| {
            user.password_hash = Some(hash);
            user.last_password_changed_time = Some(now);
        })
    }

    fn verify_password(
        &self,
        id: UserId,
        plaintext: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<PasswordVerification> {
        let user = self
            .find_by_id(id)?
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))?;

        if user.is_locked_out(now) {
            return Ok(PasswordVerification::LockedOut);
        }
        if self.policy.require_confirmed_email && !user.email_confirmed {
            return Ok(PasswordVerification::NotAllowed);
        }

        // Hash outside the lock.
        let matches = user
            .password_hash
            .as_deref()
            .is_some_and(|hash| self.hasher.verify(plaintext, hash));
        if !matches {
            return self.record_failure(id, now);
        }

        let user = self.modify(id, |user| {
            user.access_failed_count = 0;
            user.lockout_end = None;
        })?;
        if user.two_factor_enabled {
            return Ok(PasswordVerification::RequiresSecondFactor);
        }
        Ok(PasswordVerification::Succeeded)
    }

    fn roles_for_user(&self, id: UserId) -> StoreResult<Vec<String>> {
        Ok(self
            .read()?
            .memberships
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    fn add_to_roles(&self, id: UserId, roles: &[String]) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.position(id).is_none() {
            return Err(StoreError::not_found(format!("user {id}")));
        }
        let held = state.memberships.entry(id).or_default();
        for role in roles {
            if !held.contains(role) {
                held.push(role.clone());
            }
        }
        Ok(())
    }

    fn remove_from_roles(&self, id: UserId, roles: &[String]) -> StoreResult<()> {
        let mut state = self.write()?;
        if let Some(held) = state.memberships.get_mut(&id) {
            held.retain(|r| !roles.contains(r));
        }
        Ok(())
    }

    fn remove_role_everywhere(&self, role: &str) -> StoreResult<Vec<UserId>> {
        let mut state = self.write()?;
        let mut holders = Vec::new();
        for (id, held) in state.memberships.iter_mut() {
            let before = held.len();
            held.retain(|r| r != role);
            if held.len() != before {
                holders.push(*id);
            }
        }
        holders.sort();
        Ok(holders)
    }
}
