//! Login, session probe and logout.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use tracing::debug;

use keystone_auth::{AuthError, Credentials};

use crate::app::dto::{LoginRequest, LoginResponse, UserDto};
use crate::app::errors::{self, ApiError};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/is-logged-in", get(is_logged_in))
        .route("/logout", post(logout))
}

/// POST /auth/login
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<LoginRequest>,
) -> Response {
    if req.username.trim().is_empty() || req.password.trim().is_empty() {
        return ApiError(AuthError::bad_request("SERVER_EXCEPTION_BAD_REQUEST")).into_response();
    }

    let credentials = Credentials {
        username: req.username,
        password: req.password,
    };
    let result = errors::blocking(move || services.login.login(&credentials, Utc::now())).await;

    match result {
        Ok(ok) => (
            StatusCode::OK,
            Json(LoginResponse {
                token: ok.token.token,
                expires_at: ok.token.expires_at,
                user: UserDto::from(&ok.user),
                roles: ok.roles,
            }),
        )
            .into_response(),
        Err(res) => res,
    }
}

/// GET /auth/is-logged-in
pub async fn is_logged_in(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    match authz::require(&services, &principal, None) {
        Ok(user) => Json(UserDto::from(&user)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /auth/logout. Always succeeds; a stale or missing session is fine.
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> StatusCode {
    if let Err(e) = authz::require(&services, &principal, None) {
        debug!(error = %e.0, "logout without a valid session");
    }
    StatusCode::OK
}
