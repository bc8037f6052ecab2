//! Roles, role→privilege links, and the set-difference helpers used when a
//! role's grants or a user's memberships are edited.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use keystone_core::{PermissionId, RoleId};

use crate::Permission;

// ─────────────────────────────────────────────────────────────────────────────
// Links
// ─────────────────────────────────────────────────────────────────────────────

/// Reference to something a role can grant.
///
/// Tagged so one link shape can host further privilege kinds later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PrivilegeRef {
    Permission(PermissionId),
}

impl PrivilegeRef {
    pub fn permission_id(&self) -> Option<PermissionId> {
        match self {
            PrivilegeRef::Permission(id) => Some(*id),
        }
    }
}

/// A (role, privilege) link row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RolePrivilege {
    pub role_id: RoleId,
    pub privilege: PrivilegeRef,
}

// ─────────────────────────────────────────────────────────────────────────────
// Role
// ─────────────────────────────────────────────────────────────────────────────

/// A named role holding an ordered set of privilege links.
///
/// # Invariants
/// - `links` never contains the same privilege twice.
/// - Every link's `role_id` equals `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub links: Vec<RolePrivilege>,
}

/// Outcome of reconciling a role's permission links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkDiff {
    pub added: Vec<PermissionId>,
    pub removed: Vec<PermissionId>,
}

impl LinkDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl Role {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: RoleId::new(),
            name: name.into(),
            description,
            links: Vec::new(),
        }
    }

    pub fn permission_ids(&self) -> impl Iterator<Item = PermissionId> + '_ {
        self.links.iter().filter_map(|l| l.privilege.permission_id())
    }

    pub fn grants(&self, permission_id: PermissionId) -> bool {
        self.permission_ids().any(|id| id == permission_id)
    }

    /// Make the permission links equal `desired`.
    ///
    /// Surviving links keep their position; new links are appended in the order
    /// given. Links to permissions not in `desired` are dropped (the
    /// permissions themselves are untouched).
    pub fn reconcile_permissions(&mut self, desired: &[PermissionId]) -> LinkDiff {
        let wanted: HashSet<PermissionId> = desired.iter().copied().collect();
        let mut diff = LinkDiff::default();

        for id in desired {
            if !self.grants(*id) {
                self.links.push(RolePrivilege {
                    role_id: self.id,
                    privilege: PrivilegeRef::Permission(*id),
                });
                diff.added.push(*id);
            }
        }

        self.links.retain(|link| match link.privilege.permission_id() {
            Some(id) if !wanted.contains(&id) => {
                diff.removed.push(id);
                false
            }
            _ => true,
        });

        diff
    }

    /// Drop the link to one permission, if present.
    pub fn detach_permission(&mut self, permission_id: PermissionId) -> bool {
        let before = self.links.len();
        self.links
            .retain(|l| l.privilege.permission_id() != Some(permission_id));
        before != self.links.len()
    }
}

/// A role resolved together with the permissions it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleView {
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<Permission>,
}

impl RoleView {
    pub fn grants_named(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p.name == permission)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Membership diff
// ─────────────────────────────────────────────────────────────────────────────

/// Roles to add and remove to turn `current` into `desired`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleDiff {
    pub to_add: Vec<String>,
    pub to_remove: Vec<String>,
}

impl RoleDiff {
    /// Removals invalidate sessions; additions alone do not.
    pub fn requires_revocation(&self) -> bool {
        !self.to_remove.is_empty()
    }
}

/// Set difference between a user's current and desired role names.
///
/// Order follows the inputs; duplicates in either list are collapsed.
pub fn diff_roles(current: &[String], desired: &[String]) -> RoleDiff {
    let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();
    let desired_set: HashSet<&str> = desired.iter().map(String::as_str).collect();

    let mut seen = HashSet::new();
    let to_add = desired
        .iter()
        .filter(|r| !current_set.contains(r.as_str()) && seen.insert(r.as_str()))
        .cloned()
        .collect();

    let mut seen = HashSet::new();
    let to_remove = current
        .iter()
        .filter(|r| !desired_set.contains(r.as_str()) && seen.insert(r.as_str()))
        .cloned()
        .collect();

    RoleDiff { to_add, to_remove }
}
