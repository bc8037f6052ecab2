use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keystone_auth::{
    AuthorizationExplanation, Permission, PermissionType, RoleView, User, UserAccount, UserStatus,
};
use keystone_core::{PermissionId, UserId};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub nickname: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyUserRequest {
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub status: Option<UserStatus>,
    pub roles: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPasswordRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyUserRolesRequest {
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<PermissionId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRolePermissionsRequest {
    pub permissions: Vec<PermissionId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertPermissionRequest {
    pub name: String,
    pub description: Option<String>,
    pub permission_type: PermissionType,
}

impl From<UpsertPermissionRequest> for Permission {
    fn from(req: UpsertPermissionRequest) -> Self {
        Permission::new(req.name, req.description, req.permission_type)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainQuery {
    pub username: String,
    pub permission: String,
}

// -------------------------
// Response DTOs
// -------------------------

/// User as exposed over HTTP. Never carries credentials or stamps.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub nickname: Option<String>,
    pub status: UserStatus,
    pub last_request_time: DateTime<Utc>,
    pub last_password_changed_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            nickname: user.nickname.clone(),
            status: user.status,
            last_request_time: user.last_request_time,
            last_password_changed_time: user.last_password_changed_time,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDto {
    #[serde(flatten)]
    pub user: UserDto,
    pub roles: Vec<RoleView>,
}

impl From<&UserAccount> for AccountDto {
    fn from(account: &UserAccount) -> Self {
        Self {
            user: UserDto::from(&account.user),
            roles: account.roles.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserDto,
    pub roles: Vec<RoleView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainResponse {
    pub username: String,
    pub explanation: AuthorizationExplanation,
}
