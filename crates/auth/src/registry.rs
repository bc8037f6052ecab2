//! Permission and role registries.
//!
//! Both registries own the revocation side effects of their edits: anything
//! that narrows or changes what a role grants revokes the sessions of the
//! users holding it.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use keystone_core::{PermissionId, StoreError, UserId};

use crate::directory::{CredentialDirectory, PermissionStore, RoleStore};
use crate::error::{AuthError, AuthResult};
use crate::revocation::FanOut;
use crate::roles::{Role, RoleView, diff_roles};
use crate::token::TokenService;
use crate::user::{TokenInvalidationReason, User};
use crate::Permission;

const READING_PERMISSIONS: &str = "TECHNICAL_MESSAGE_READING_PERMISSIONS";
const UPDATING_PERMISSION: &str = "TECHNICAL_MESSAGE_UPDATING_PERMISSION";
const READING_ROLES: &str = "TECHNICAL_MESSAGE_READING_ROLES";
const UPDATING_ROLE: &str = "TECHNICAL_MESSAGE_UPDATING_ROLE";
const UPDATING_USER_ROLES: &str = "TECHNICAL_MESSAGE_UPDATING_USER_ROLES";

const PERMISSION_NOT_FOUND: &str = "USER_MESSAGE_PERMISSION_NOT_FOUND";
const ROLE_NOT_FOUND: &str = "USER_MESSAGE_ROLE_NOT_FOUND";

/// Role names whose links include any of `permissions`.
fn roles_linking(roles: &dyn RoleStore, permissions: &HashSet<PermissionId>) -> AuthResult<HashSet<String>> {
    Ok(roles
        .list()
        .map_err(|e| AuthError::store(READING_ROLES, e))?
        .into_iter()
        .filter(|role| role.permission_ids().any(|id| permissions.contains(&id)))
        .map(|role| role.name)
        .collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// Permission Registry
// ─────────────────────────────────────────────────────────────────────────────

pub struct PermissionRegistry {
    permissions: Arc<dyn PermissionStore>,
    roles: Arc<dyn RoleStore>,
    fan_out: FanOut,
}

impl PermissionRegistry {
    pub fn new(
        permissions: Arc<dyn PermissionStore>,
        roles: Arc<dyn RoleStore>,
        fan_out: FanOut,
    ) -> Self {
        Self {
            permissions,
            roles,
            fan_out,
        }
    }

    pub fn list(&self) -> AuthResult<Vec<Permission>> {
        self.permissions
            .list()
            .map_err(|e| AuthError::store(READING_PERMISSIONS, e))
    }

    pub fn get(&self, id: PermissionId) -> AuthResult<Permission> {
        self.permissions
            .get(id)
            .map_err(|e| AuthError::store(READING_PERMISSIONS, e))?
            .ok_or_else(|| AuthError::not_found(PERMISSION_NOT_FOUND, id.to_string()))
    }

    /// Insert or overwrite a permission, keyed by name.
    ///
    /// An existing permission with the same name keeps its id. Changing an
    /// existing permission revokes the holders of every role linked to it;
    /// re-submitting an identical record is a no-op.
    pub fn upsert(&self, permission: Permission) -> AuthResult<Permission> {
        let mut saved = self.upsert_many(vec![permission])?;
        saved
            .pop()
            .ok_or_else(|| AuthError::store(UPDATING_PERMISSION, StoreError::unavailable("empty upsert")))
    }

    /// Batch form of [`PermissionRegistry::upsert`]; revocation runs once for
    /// the whole batch.
    pub fn upsert_many(&self, permissions: Vec<Permission>) -> AuthResult<Vec<Permission>> {
        let mut saved = Vec::with_capacity(permissions.len());
        let mut changed = HashSet::new();

        for mut permission in permissions {
            if permission.name.trim().is_empty() {
                return Err(AuthError::bad_request("USER_MESSAGE_PERMISSION_NAME_REQUIRED"));
            }

            let existing = self
                .permissions
                .find_by_name(&permission.name)
                .map_err(|e| AuthError::store(READING_PERMISSIONS, e))?;

            if let Some(existing) = existing {
                permission.id = existing.id;
                if existing == permission {
                    saved.push(existing);
                    continue;
                }
                changed.insert(permission.id);
            }

            let permission = self
                .permissions
                .save(permission)
                .map_err(|e| AuthError::store(UPDATING_PERMISSION, e))?;
            info!(permission = %permission.name, id = %permission.id, "upserted permission");
            saved.push(permission);
        }

        if !changed.is_empty() {
            let affected = roles_linking(self.roles.as_ref(), &changed)?;
            self.fan_out
                .revoke_role_holders(&affected, TokenInvalidationReason::PermissionModified)?;
        }

        Ok(saved)
    }

    /// Delete a permission and detach it from every role.
    pub fn delete(&self, id: PermissionId) -> AuthResult<()> {
        let permission = self.get(id)?;

        let mut affected = HashSet::new();
        for mut role in self
            .roles
            .list()
            .map_err(|e| AuthError::store(READING_ROLES, e))?
        {
            if role.detach_permission(id) {
                affected.insert(role.name.clone());
                self.roles
                    .save(role)
                    .map_err(|e| AuthError::store(UPDATING_ROLE, e))?;
            }
        }

        self.permissions
            .delete(id)
            .map_err(|e| AuthError::store(UPDATING_PERMISSION, e))?;
        info!(permission = %permission.name, roles = affected.len(), "deleted permission");

        self.fan_out
            .revoke_role_holders(&affected, TokenInvalidationReason::PermissionModified)?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Role Registry
// ─────────────────────────────────────────────────────────────────────────────

pub struct RoleRegistry {
    roles: Arc<dyn RoleStore>,
    permissions: Arc<dyn PermissionStore>,
    directory: Arc<dyn CredentialDirectory>,
    tokens: Arc<TokenService>,
    fan_out: FanOut,
}

impl RoleRegistry {
    pub fn new(
        roles: Arc<dyn RoleStore>,
        permissions: Arc<dyn PermissionStore>,
        directory: Arc<dyn CredentialDirectory>,
        tokens: Arc<TokenService>,
        fan_out: FanOut,
    ) -> Self {
        Self {
            roles,
            permissions,
            directory,
            tokens,
            fan_out,
        }
    }

    fn find(&self, name: &str) -> AuthResult<Role> {
        self.roles
            .find_by_name(name)
            .map_err(|e| AuthError::store(READING_ROLES, e))?
            .ok_or_else(|| AuthError::not_found(ROLE_NOT_FOUND, name))
    }

    /// Resolve a role's links to full permission records, in link order.
    fn view(&self, role: Role) -> AuthResult<RoleView> {
        let mut permissions = Vec::new();
        for id in role.permission_ids() {
            if let Some(p) = self
                .permissions
                .get(id)
                .map_err(|e| AuthError::store(READING_PERMISSIONS, e))?
            {
                permissions.push(p);
            }
        }
        Ok(RoleView {
            name: role.name,
            description: role.description,
            permissions,
        })
    }

    fn ensure_permissions_exist(&self, ids: &[PermissionId]) -> AuthResult<()> {
        for id in ids {
            let found = self
                .permissions
                .get(*id)
                .map_err(|e| AuthError::store(READING_PERMISSIONS, e))?;
            if found.is_none() {
                return Err(AuthError::not_found(PERMISSION_NOT_FOUND, id.to_string()));
            }
        }
        Ok(())
    }

    /// Fail with `NotFound` on the first unknown role name.
    pub fn ensure_roles_exist(&self, names: &[String]) -> AuthResult<()> {
        for name in names {
            self.find(name)?;
        }
        Ok(())
    }

    pub fn list_roles(&self) -> AuthResult<Vec<RoleView>> {
        self.roles
            .list()
            .map_err(|e| AuthError::store(READING_ROLES, e))?
            .into_iter()
            .map(|role| self.view(role))
            .collect()
    }

    pub fn find_role_by_name(&self, name: &str) -> AuthResult<RoleView> {
        let role = self.find(name)?;
        self.view(role)
    }

    pub fn create_role(
        &self,
        name: &str,
        description: Option<String>,
        permissions: &[PermissionId],
    ) -> AuthResult<RoleView> {
        if name.trim().is_empty() {
            return Err(AuthError::bad_request("USER_MESSAGE_ROLE_NAME_REQUIRED"));
        }
        let exists = self
            .roles
            .find_by_name(name)
            .map_err(|e| AuthError::store(READING_ROLES, e))?;
        if exists.is_some() {
            return Err(AuthError::bad_request("USER_MESSAGE_ROLE_ALREADY_EXISTS"));
        }
        self.ensure_permissions_exist(permissions)?;

        let mut role = Role::new(name, description);
        role.reconcile_permissions(permissions);
        let role = self.roles.insert(role).map_err(|e| match e {
            StoreError::Validation(_) => AuthError::bad_request("USER_MESSAGE_ROLE_ALREADY_EXISTS"),
            other => AuthError::store(UPDATING_ROLE, other),
        })?;

        info!(role = %role.name, permissions = role.links.len(), "created role");
        self.view(role)
    }

    /// Delete a role, drop every membership in it, and revoke its former
    /// holders. The role's permissions are left untouched.
    pub fn delete_role(&self, name: &str) -> AuthResult<()> {
        let role = self.find(name)?;

        let holders = self
            .directory
            .remove_role_everywhere(&role.name)
            .map_err(|e| AuthError::store(UPDATING_USER_ROLES, e))?;
        self.roles
            .delete(role.id)
            .map_err(|e| AuthError::store(UPDATING_ROLE, e))?;
        info!(role = %role.name, holders = holders.len(), "deleted role");

        self.fan_out
            .revoke_users(&holders, TokenInvalidationReason::RoleModified)?;
        Ok(())
    }

    /// Make the role grant exactly `desired`. Removing a link revokes every
    /// holder of the role; adding links alone does not.
    pub fn set_role_permissions(&self, name: &str, desired: &[PermissionId]) -> AuthResult<RoleView> {
        let mut role = self.find(name)?;
        self.ensure_permissions_exist(desired)?;

        let diff = role.reconcile_permissions(desired);
        if diff.is_empty() {
            return self.view(role);
        }

        let role = self
            .roles
            .save(role)
            .map_err(|e| AuthError::store(UPDATING_ROLE, e))?;
        info!(
            role = %role.name,
            added = diff.added.len(),
            removed = diff.removed.len(),
            "reconciled role permissions"
        );

        if !diff.removed.is_empty() {
            let affected = HashSet::from([role.name.clone()]);
            self.fan_out
                .revoke_role_holders(&affected, TokenInvalidationReason::RoleModified)?;
        }
        self.view(role)
    }

    pub fn roles_for_user(&self, user_id: UserId) -> AuthResult<Vec<RoleView>> {
        let names = self
            .directory
            .roles_for_user(user_id)
            .map_err(|e| AuthError::store(READING_ROLES, e))?;

        let mut views = Vec::with_capacity(names.len());
        for name in names {
            // A membership may outlive its role briefly; skip it.
            if let Some(role) = self
                .roles
                .find_by_name(&name)
                .map_err(|e| AuthError::store(READING_ROLES, e))?
            {
                views.push(self.view(role)?);
            }
        }
        Ok(views)
    }

    /// Set the user's roles to `desired`. Losing any role revokes the user's
    /// sessions with `ROLE_MODIFIED`.
    pub fn modify_user_roles(&self, user: &User, desired: &[String]) -> AuthResult<Vec<RoleView>> {
        self.ensure_roles_exist(desired)?;

        let current = self
            .directory
            .roles_for_user(user.id)
            .map_err(|e| AuthError::store(READING_ROLES, e))?;
        let diff = diff_roles(&current, desired);

        if !diff.to_remove.is_empty() {
            self.directory
                .remove_from_roles(user.id, &diff.to_remove)
                .map_err(|e| AuthError::store(UPDATING_USER_ROLES, e))?;
        }
        if !diff.to_add.is_empty() {
            self.directory
                .add_to_roles(user.id, &diff.to_add)
                .map_err(|e| AuthError::store(UPDATING_USER_ROLES, e))?;
        }

        if diff.requires_revocation() {
            self.tokens
                .revoke_by_id(user.id, TokenInvalidationReason::RoleModified)?;
        }

        info!(
            user = %user.username,
            added = ?diff.to_add,
            removed = ?diff.to_remove,
            "updated role memberships"
        );
        self.roles_for_user(user.id)
    }

    /// Whether any of the user's roles grants `permission`. Stops at the
    /// first role that does.
    pub fn has_permission(&self, user_id: UserId, permission: &str) -> AuthResult<bool> {
        let names = self
            .directory
            .roles_for_user(user_id)
            .map_err(|e| AuthError::store(READING_ROLES, e))?;

        for name in names {
            let Some(role) = self
                .roles
                .find_by_name(&name)
                .map_err(|e| AuthError::store(READING_ROLES, e))?
            else {
                continue;
            };
            for id in role.permission_ids() {
                let granted = self
                    .permissions
                    .get(id)
                    .map_err(|e| AuthError::store(READING_PERMISSIONS, e))?
                    .is_some_and(|p| p.name == permission);
                if granted {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
