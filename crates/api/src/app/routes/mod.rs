use axum::{Router, routing::get};

pub mod auth;
pub mod rbac;
pub mod system;
pub mod users;

/// Router for every endpoint behind the bearer middleware.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/auth", auth::router())
        .nest("/admin", users::router().merge(rbac::router()))
}
