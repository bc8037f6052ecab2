//! User administration endpoints (`USER_MANAGEMENT`).

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
};
use chrono::Utc;

use keystone_auth::permissions::admin;
use keystone_auth::{NewUser, UserChanges};

use crate::app::dto::{
    AccountDto, CreateUserRequest, ModifyUserRequest, ModifyUserRolesRequest, SetPasswordRequest,
    UserDto,
};
use crate::app::errors::{self, ApiError};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:username", get(get_user).put(modify_user))
        .route("/users/:username/password", put(set_password))
        .route("/users/:username/roles", put(modify_user_roles))
}

/// GET /admin/users
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    authz::require(&services, &principal, Some(admin::USER_MANAGEMENT))?;
    let accounts = services.accounts.list_users()?;
    let body: Vec<AccountDto> = accounts.iter().map(AccountDto::from).collect();
    Ok(Json(body).into_response())
}

/// POST /admin/users
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Response, ApiError> {
    authz::require(&services, &principal, Some(admin::USER_MANAGEMENT))?;

    let new = NewUser {
        username: req.username,
        email: req.email,
        nickname: req.nickname,
        password: req.password,
        roles: req.roles,
    };
    let result = errors::blocking(move || services.accounts.create_user(new, Utc::now())).await;
    Ok(match result {
        Ok(account) => (StatusCode::CREATED, Json(AccountDto::from(&account))).into_response(),
        Err(res) => res,
    })
}

/// GET /admin/users/:username
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(username): Path<String>,
) -> Result<Response, ApiError> {
    authz::require(&services, &principal, Some(admin::USER_MANAGEMENT))?;
    let account = services.accounts.find_user_by_name(&username)?;
    Ok(Json(AccountDto::from(&account)).into_response())
}

/// PUT /admin/users/:username
pub async fn modify_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(username): Path<String>,
    Json(req): Json<ModifyUserRequest>,
) -> Result<Response, ApiError> {
    authz::require(&services, &principal, Some(admin::USER_MANAGEMENT))?;
    let changes = UserChanges {
        email: req.email,
        nickname: req.nickname,
        status: req.status,
        roles: req.roles,
    };
    let account = services.accounts.modify_user(&username, changes)?;
    Ok(Json(AccountDto::from(&account)).into_response())
}

/// PUT /admin/users/:username/password
pub async fn set_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(username): Path<String>,
    Json(req): Json<SetPasswordRequest>,
) -> Result<Response, ApiError> {
    authz::require(&services, &principal, Some(admin::USER_MANAGEMENT))?;
    let result = errors::blocking(move || {
        services
            .accounts
            .set_password(&username, &req.password, Utc::now())
    })
    .await;
    Ok(match result {
        Ok(user) => Json(UserDto::from(&user)).into_response(),
        Err(res) => res,
    })
}

/// PUT /admin/users/:username/roles
pub async fn modify_user_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(username): Path<String>,
    Json(req): Json<ModifyUserRolesRequest>,
) -> Result<Response, ApiError> {
    authz::require(&services, &principal, Some(admin::ROLE_MANAGEMENT))?;
    let account = services.accounts.find_user_by_name(&username)?;
    let roles = services.roles.modify_user_roles(&account.user, &req.roles)?;
    Ok(Json(roles).into_response())
}
