//! In-memory permission and role stores for tests/dev.

use std::sync::RwLock;

use keystone_auth::{Permission, PermissionStore, Role, RoleStore};
use keystone_core::{PermissionId, RoleId, StoreError, StoreResult};

fn poisoned() -> StoreError {
    StoreError::unavailable("rbac store lock poisoned")
}

/// Permissions in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    inner: RwLock<Vec<Permission>>,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PermissionStore for InMemoryPermissionStore {
    fn list(&self) -> StoreResult<Vec<Permission>> {
        Ok(self.inner.read().map_err(|_| poisoned())?.clone())
    }

    fn get(&self, id: PermissionId) -> StoreResult<Option<Permission>> {
        let items = self.inner.read().map_err(|_| poisoned())?;
        Ok(items.iter().find(|p| p.id == id).cloned())
    }

    fn find_by_name(&self, name: &str) -> StoreResult<Option<Permission>> {
        let items = self.inner.read().map_err(|_| poisoned())?;
        Ok(items.iter().find(|p| p.name == name).cloned())
    }

    fn save(&self, permission: Permission) -> StoreResult<Permission> {
        let mut items = self.inner.write().map_err(|_| poisoned())?;
        match items.iter_mut().find(|p| p.id == permission.id) {
            Some(slot) => *slot = permission.clone(),
            None => items.push(permission.clone()),
        }
        Ok(permission)
    }

    fn delete(&self, id: PermissionId) -> StoreResult<bool> {
        let mut items = self.inner.write().map_err(|_| poisoned())?;
        let before = items.len();
        items.retain(|p| p.id != id);
        Ok(items.len() != before)
    }
}

/// Roles (with their links) in insertion order. Names are unique.
#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    inner: RwLock<Vec<Role>>,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoleStore for InMemoryRoleStore {
    fn list(&self) -> StoreResult<Vec<Role>> {
        Ok(self.inner.read().map_err(|_| poisoned())?.clone())
    }

    fn find_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let roles = self.inner.read().map_err(|_| poisoned())?;
        Ok(roles.iter().find(|r| r.name == name).cloned())
    }

    fn insert(&self, role: Role) -> StoreResult<Role> {
        let mut roles = self.inner.write().map_err(|_| poisoned())?;
        if roles.iter().any(|r| r.name == role.name) {
            return Err(StoreError::validation(format!(
                "role '{}' already exists",
                role.name
            )));
        }
        roles.push(role.clone());
        Ok(role)
    }

    fn save(&self, role: Role) -> StoreResult<Role> {
        let mut roles = self.inner.write().map_err(|_| poisoned())?;
        let slot = roles
            .iter_mut()
            .find(|r| r.id == role.id)
            .ok_or_else(|| StoreError::not_found(format!("role {}", role.id)))?;
        *slot = role.clone();
        Ok(role)
    }

    fn delete(&self, id: RoleId) -> StoreResult<bool> {
        let mut roles = self.inner.write().map_err(|_| poisoned())?;
        let before = roles.len();
        roles.retain(|r| r.id != id);
        Ok(roles.len() != before)
    }
}
