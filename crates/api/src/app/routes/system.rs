use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::app::{dto::UserDto, services::AppServices};
use crate::authz;
use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    match authz::require(&services, &principal, None) {
        Ok(user) => Json(UserDto::from(&user)).into_response(),
        Err(e) => e.into_response(),
    }
}
