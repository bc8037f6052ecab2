use std::collections::BTreeSet;

use serde::Serialize;

use keystone_core::UserId;

use crate::roles::RoleView;
use crate::user::{User, UserStatus};

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Why a permission check would pass or fail for a given user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationExplanation {
    pub required_permission: String,
    pub granted: bool,
    pub reason: String,
    pub principal: PrincipalState,
    /// Roles held by the user that grant the permission.
    pub granting_roles: Vec<String>,
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalState {
    pub user_id: UserId,
    pub username: String,
    pub status: UserStatus,
    pub roles: Vec<String>,
    /// Flattened, sorted permission names across all roles.
    pub effective_permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    AccountInactive,
    MissingPermission,
}

/// Explain the decision the session guard would reach for `user` holding
/// `roles` when `permission` is required.
pub fn explain_authorization(
    user: &User,
    roles: &[RoleView],
    permission: &str,
) -> AuthorizationExplanation {
    let effective: BTreeSet<&str> = roles
        .iter()
        .flat_map(|r| r.permissions.iter().map(|p| p.name.as_str()))
        .collect();
    let granting_roles: Vec<String> = roles
        .iter()
        .filter(|r| r.grants_named(permission))
        .map(|r| r.name.clone())
        .collect();

    let principal = PrincipalState {
        user_id: user.id,
        username: user.username.clone(),
        status: user.status,
        roles: roles.iter().map(|r| r.name.clone()).collect(),
        effective_permissions: effective.iter().map(|p| p.to_string()).collect(),
    };

    if !user.is_active() {
        return AuthorizationExplanation {
            required_permission: permission.to_string(),
            granted: false,
            reason: format!("Account status is {}", user.status),
            principal,
            granting_roles,
            denial_reason: Some(DenialReason {
                kind: DenialKind::AccountInactive,
                message: "Only ACTIVE accounts pass the session guard".to_string(),
                suggestions: vec!["Set the account status to ACTIVE".to_string()],
            }),
        };
    }

    if !granting_roles.is_empty() {
        return AuthorizationExplanation {
            required_permission: permission.to_string(),
            reason: format!("Granted by role(s) {granting_roles:?}"),
            granted: true,
            principal,
            granting_roles,
            denial_reason: None,
        };
    }

    AuthorizationExplanation {
        required_permission: permission.to_string(),
        granted: false,
        reason: format!(
            "No role held by '{}' grants '{}'",
            user.username, permission
        ),
        denial_reason: Some(DenialReason {
            kind: DenialKind::MissingPermission,
            message: format!("Missing required permission: '{permission}'"),
            suggestions: vec![
                format!("Assign a role that grants the '{permission}' permission"),
                format!("Link '{permission}' to one of the user's roles: {:?}", principal.roles),
            ],
        }),
        principal,
        granting_roles,
    }
}
