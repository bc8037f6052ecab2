//! Role and permission administration, plus the authorization explainer
//! for debugging "why was this request denied?".

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, put},
};

use keystone_auth::permissions::admin;
use keystone_auth::{Permission, explain_authorization};
use keystone_core::PermissionId;

use crate::app::dto::{
    CreateRoleRequest, ExplainQuery, ExplainResponse, SetRolePermissionsRequest,
    UpsertPermissionRequest,
};
use crate::app::errors::{ApiError, json_error};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:name", get(get_role).delete(delete_role))
        .route("/roles/:name/permissions", put(set_role_permissions))
        .route("/permissions", get(list_permissions).put(upsert_permissions))
        .route("/permissions/:id", delete(delete_permission))
        .route("/explain", get(explain))
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin/roles
pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    authz::require(&services, &principal, Some(admin::ROLE_MANAGEMENT))?;
    Ok(Json(services.roles.list_roles()?).into_response())
}

/// POST /admin/roles
pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(req): Json<CreateRoleRequest>,
) -> Result<Response, ApiError> {
    authz::require(&services, &principal, Some(admin::ROLE_MANAGEMENT))?;
    let role = services
        .roles
        .create_role(&req.name, req.description, &req.permissions)?;
    Ok((StatusCode::CREATED, Json(role)).into_response())
}

/// GET /admin/roles/:name
pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    authz::require(&services, &principal, Some(admin::ROLE_MANAGEMENT))?;
    Ok(Json(services.roles.find_role_by_name(&name)?).into_response())
}

/// DELETE /admin/roles/:name
pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    authz::require(&services, &principal, Some(admin::ROLE_MANAGEMENT))?;
    services.roles.delete_role(&name)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// PUT /admin/roles/:name/permissions
pub async fn set_role_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(name): Path<String>,
    Json(req): Json<SetRolePermissionsRequest>,
) -> Result<Response, ApiError> {
    authz::require(&services, &principal, Some(admin::ROLE_MANAGEMENT))?;
    let role = services
        .roles
        .set_role_permissions(&name, &req.permissions)?;
    Ok(Json(role).into_response())
}

// ─────────────────────────────────────────────────────────────────────────────
// Permissions
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin/permissions
pub async fn list_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    authz::require(&services, &principal, Some(admin::PERMISSION_MANAGEMENT))?;
    Ok(Json(services.permissions.list()?).into_response())
}

/// PUT /admin/permissions (batch upsert by name)
pub async fn upsert_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(req): Json<Vec<UpsertPermissionRequest>>,
) -> Result<Response, ApiError> {
    authz::require(&services, &principal, Some(admin::PERMISSION_MANAGEMENT))?;
    let permissions: Vec<Permission> = req.into_iter().map(Permission::from).collect();
    Ok(Json(services.permissions.upsert_many(permissions)?).into_response())
}

/// DELETE /admin/permissions/:id
pub async fn delete_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authz::require(&services, &principal, Some(admin::PERMISSION_MANAGEMENT))?;
    let Ok(id) = id.parse::<PermissionId>() else {
        return Ok(json_error(
            StatusCode::BAD_REQUEST,
            "BAD_REQUEST",
            "USER_MESSAGE_INVALID_PERMISSION_ID",
        ));
    };
    services.permissions.delete(id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ─────────────────────────────────────────────────────────────────────────────
// Explain
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin/explain?username=..&permission=..
pub async fn explain(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ExplainQuery>,
) -> Result<Response, ApiError> {
    authz::require(&services, &principal, Some(admin::ROLE_MANAGEMENT))?;
    let account = services.accounts.find_user_by_name(&query.username)?;
    let explanation = explain_authorization(&account.user, &account.roles, &query.permission);
    Ok(Json(ExplainResponse {
        username: account.user.username,
        explanation,
    })
    .into_response())
}
