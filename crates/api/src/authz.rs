//! API-side session and permission gate.
//!
//! Every admin handler calls [`require`] before touching a service.

use chrono::Utc;

use keystone_auth::User;
use keystone_infra::AuthSystem;

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

/// Run the session guard for this request, optionally requiring a permission.
pub fn require(
    system: &AuthSystem,
    principal: &PrincipalContext,
    permission: Option<&str>,
) -> Result<User, ApiError> {
    Ok(system
        .guard
        .check(principal.principal(), permission, Utc::now())?)
}
