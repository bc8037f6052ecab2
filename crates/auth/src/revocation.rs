use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use keystone_core::UserId;

use crate::directory::CredentialDirectory;
use crate::error::{AuthError, AuthResult};
use crate::token::TokenService;
use crate::user::TokenInvalidationReason;

const READING_USERS: &str = "TECHNICAL_MESSAGE_READING_USERS";

/// Revokes the sessions of every user affected by a privilege edit.
///
/// Enumerate-and-update with no isolation: a failure part way through leaves
/// the users already handled revoked. Each user is revoked at most once per
/// call.
#[derive(Clone)]
pub struct FanOut {
    directory: Arc<dyn CredentialDirectory>,
    tokens: Arc<TokenService>,
}

impl FanOut {
    pub fn new(directory: Arc<dyn CredentialDirectory>, tokens: Arc<TokenService>) -> Self {
        Self { directory, tokens }
    }

    /// Revoke every user holding at least one of `roles`.
    pub fn revoke_role_holders(
        &self,
        roles: &HashSet<String>,
        reason: TokenInvalidationReason,
    ) -> AuthResult<usize> {
        if roles.is_empty() {
            return Ok(0);
        }

        let users = self
            .directory
            .list_users()
            .map_err(|e| AuthError::store(READING_USERS, e))?;

        let mut revoked = 0;
        for user in &users {
            let held = self
                .directory
                .roles_for_user(user.id)
                .map_err(|e| AuthError::store(READING_USERS, e))?;
            if held.iter().any(|r| roles.contains(r)) {
                self.tokens.revoke(user, reason)?;
                revoked += 1;
            }
        }

        info!(roles = ?roles, reason = %reason, revoked, "fan-out revocation complete");
        Ok(revoked)
    }

    /// Revoke an explicit list of users, skipping repeats.
    pub fn revoke_users(&self, users: &[UserId], reason: TokenInvalidationReason) -> AuthResult<usize> {
        let mut seen = HashSet::new();
        let mut revoked = 0;
        for id in users {
            if seen.insert(*id) {
                self.tokens.revoke_by_id(*id, reason)?;
                revoked += 1;
            }
        }
        info!(reason = %reason, revoked, "revoked former role holders");
        Ok(revoked)
    }
}
