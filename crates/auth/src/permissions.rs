use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use keystone_core::PermissionId;

bitflags! {
    /// Which side of the system a permission applies to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PermissionType: u8 {
        /// Evaluated by client applications (UI gating).
        const CLIENT = 0b01;
        /// Enforced by the server on requests.
        const SERVER = 0b10;
    }
}

/// A named, typed permission.
///
/// Names are unique across the registry; see
/// [`PermissionRegistry::upsert`](crate::PermissionRegistry::upsert) for how
/// that is maintained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub description: Option<String>,
    pub permission_type: PermissionType,
}

impl Permission {
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        permission_type: PermissionType,
    ) -> Self {
        Self {
            id: PermissionId::new(),
            name: name.into(),
            description,
            permission_type,
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Permissions guarding the administration API itself.
pub mod admin {
    use super::{Permission, PermissionType};

    pub const USER_MANAGEMENT: &str = "USER_MANAGEMENT";
    pub const ROLE_MANAGEMENT: &str = "ROLE_MANAGEMENT";
    pub const PERMISSION_MANAGEMENT: &str = "PERMISSION_MANAGEMENT";

    /// Built-in permission set seeded at startup (idempotent).
    pub fn builtin() -> Vec<Permission> {
        let both = PermissionType::CLIENT | PermissionType::SERVER;
        vec![
            Permission::new(USER_MANAGEMENT, Some("Manage user accounts".to_string()), both),
            Permission::new(ROLE_MANAGEMENT, Some("Manage roles and memberships".to_string()), both),
            Permission::new(
                PERMISSION_MANAGEMENT,
                Some("Manage the permission catalogue".to_string()),
                both,
            ),
        ]
    }
}
