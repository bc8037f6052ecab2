use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::directory::CredentialDirectory;
use crate::error::{AuthError, AuthResult, LoginFailure};
use crate::principal::Principal;
use crate::registry::RoleRegistry;
use crate::user::User;

const READING_USER: &str = "TECHNICAL_MESSAGE_READING_USER";
const UPDATING_USER: &str = "TECHNICAL_MESSAGE_UPDATING_USER";

/// Per-request gate: principal, account status, inactivity, then an optional
/// permission, strictly in that order.
pub struct SessionGuard {
    directory: Arc<dyn CredentialDirectory>,
    registry: Arc<RoleRegistry>,
    inactivity: Duration,
}

impl SessionGuard {
    pub fn new(
        directory: Arc<dyn CredentialDirectory>,
        registry: Arc<RoleRegistry>,
        inactivity: Duration,
    ) -> Self {
        Self {
            directory,
            registry,
            inactivity,
        }
    }

    /// Resolve the acting user and refresh their activity time.
    pub fn validate_user(&self, principal: &Principal, now: DateTime<Utc>) -> AuthResult<User> {
        let Some(identity) = principal.identity() else {
            return Err(AuthError::Unauthorized {
                reason: principal.invalidation_reason(),
            });
        };

        let user = self
            .directory
            .find_by_id(identity.user_id)
            .map_err(|e| AuthError::store(READING_USER, e))?
            .ok_or_else(AuthError::unauthorized)?;

        if !user.is_active() {
            return Err(LoginFailure::AccountStatusError(user.status).into());
        }

        let idle = user.idle_for(now);
        if idle > self.inactivity {
            warn!(
                user = %user.username,
                idle_secs = idle.num_seconds(),
                "session expired after inactivity"
            );
            return Err(AuthError::LoginTimeout);
        }

        self.directory
            .touch(user.id, now)
            .map_err(|e| AuthError::store(UPDATING_USER, e))
    }

    pub fn has_permission(&self, user: &User, permission: &str) -> AuthResult<bool> {
        self.registry.has_permission(user.id, permission)
    }

    /// Full request check. `permission = None` only requires a live session.
    pub fn check(
        &self,
        principal: &Principal,
        permission: Option<&str>,
        now: DateTime<Utc>,
    ) -> AuthResult<User> {
        let user = self.validate_user(principal, now)?;

        if let Some(permission) = permission {
            if !self.has_permission(&user, permission)? {
                debug!(user = %user.username, permission, "permission denied");
                return Err(AuthError::Forbidden {
                    permission: permission.to_string(),
                });
            }
        }
        Ok(user)
    }
}
