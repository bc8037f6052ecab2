//! Boundary toward the credential directory (user persistence) and the
//! privilege stores.
//!
//! The core never locks anything itself. Implementations make each operation
//! atomic per record. Wholesale `update` is optimistic on `security_stamp`, so
//! a copy read before a revocation can never restore the revoked stamps.

use chrono::{DateTime, Utc};

use keystone_core::{PermissionId, RoleId, StoreResult, UserId};

use crate::{Permission, Role, TokenInvalidationReason, User, UserStatus};

/// Outcome of a password check, after the directory applied its own failure
/// counting and lockout policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordVerification {
    Succeeded,
    LockedOut,
    NotAllowed,
    RequiresSecondFactor,
    Failed,
}

/// User records, credentials and role memberships.
pub trait CredentialDirectory: Send + Sync {
    fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>>;
    fn list_users(&self) -> StoreResult<Vec<User>>;

    /// Insert a new record; duplicate usernames/emails are validation errors.
    fn create(&self, user: User) -> StoreResult<User>;
    /// Replace an existing record wholesale.
    ///
    /// Fails with `StoreError::Conflict` when the stored `security_stamp` no
    /// longer matches the one on `user`.
    fn update(&self, user: User) -> StoreResult<User>;

    /// Rotate both stamps and record `reason` (unless `NONE`) in place.
    fn rotate_stamps(&self, id: UserId, reason: TokenInvalidationReason) -> StoreResult<User>;
    /// Set `last_request_time` only.
    fn touch(&self, id: UserId, now: DateTime<Utc>) -> StoreResult<User>;
    /// Set `status` only.
    fn set_status(&self, id: UserId, status: UserStatus) -> StoreResult<User>;

    fn set_password(&self, id: UserId, plaintext: &str, now: DateTime<Utc>) -> StoreResult<User>;
    fn verify_password(
        &self,
        id: UserId,
        plaintext: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<PasswordVerification>;

    /// Role names held by the user, in assignment order.
    fn roles_for_user(&self, id: UserId) -> StoreResult<Vec<String>>;
    fn add_to_roles(&self, id: UserId, roles: &[String]) -> StoreResult<()>;
    fn remove_from_roles(&self, id: UserId, roles: &[String]) -> StoreResult<()>;
    /// Drop a role from every user; returns the users that held it.
    fn remove_role_everywhere(&self, role: &str) -> StoreResult<Vec<UserId>>;
}

/// Canonical permission catalogue. Keyed by id; name uniqueness is the
/// registry's job.
pub trait PermissionStore: Send + Sync {
    fn list(&self) -> StoreResult<Vec<Permission>>;
    fn get(&self, id: PermissionId) -> StoreResult<Option<Permission>>;
    fn find_by_name(&self, name: &str) -> StoreResult<Option<Permission>>;
    /// Insert or replace by id.
    fn save(&self, permission: Permission) -> StoreResult<Permission>;
    fn delete(&self, id: PermissionId) -> StoreResult<bool>;
}

/// Roles together with their privilege links.
pub trait RoleStore: Send + Sync {
    fn list(&self) -> StoreResult<Vec<Role>>;
    fn find_by_name(&self, name: &str) -> StoreResult<Option<Role>>;
    /// Insert a new role; a duplicate name is a validation error.
    fn insert(&self, role: Role) -> StoreResult<Role>;
    /// Replace an existing role (and its links) by id.
    fn save(&self, role: Role) -> StoreResult<Role>;
    fn delete(&self, id: RoleId) -> StoreResult<bool>;
}
