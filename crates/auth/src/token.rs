//! Session token issuance, validation and stamp-based revocation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use keystone_core::{Stamp, TokenId, UserId};

use crate::claims::{Hs256Jwt, JwtClaims};
use crate::config::AuthConfig;
use crate::directory::CredentialDirectory;
use crate::error::{AuthError, AuthResult};
use crate::principal::{Identity, Principal};
use crate::user::{TokenInvalidationReason, User};

const UPDATING_USER: &str = "TECHNICAL_MESSAGE_UPDATING_USER";

/// A freshly minted token and the metadata callers usually want alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: TokenId,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenService {
    jwt: Hs256Jwt,
    issuer: String,
    audience: String,
    lifetime: Duration,
    directory: Arc<dyn CredentialDirectory>,
}

impl TokenService {
    pub fn new(config: &AuthConfig, directory: Arc<dyn CredentialDirectory>) -> Self {
        Self {
            jwt: Hs256Jwt::new(
                config.jwt_key.as_bytes(),
                &config.jwt_issuer,
                &config.jwt_audience,
            ),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            lifetime: config.token_lifetime(),
            directory,
        }
    }

    /// Mint a token bound to the user's current `valid_token_stamp`.
    ///
    /// Does not touch the user record.
    pub fn issue(&self, username: &str, user: &User, now: DateTime<Utc>) -> AuthResult<IssuedToken> {
        let expires_at = now + self.lifetime;
        let claims = JwtClaims {
            sub: user.id,
            jti: TokenId::new(),
            nameid: user.id,
            unique_name: username.to_string(),
            stamp: user.valid_token_stamp,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        let token = self.jwt.sign(&claims).map_err(|e| AuthError::General {
            user_message: "SERVER_EXCEPTION_SERVER_ERROR".to_string(),
            technical_message: "TECHNICAL_MESSAGE_ISSUING_TOKEN".to_string(),
            detail: e.to_string(),
        })?;

        debug!(user_id = %user.id, token_id = %claims.jti, "issued session token");
        Ok(IssuedToken {
            token,
            token_id: claims.jti,
            expires_at,
        })
    }

    /// Validate a bearer token against the current user record.
    ///
    /// Never fails: anything short of a fully valid, unrevoked token yields an
    /// anonymous principal. When the token's stamp is stale and the user has a
    /// recorded revocation reason, the reason rides along.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Principal {
        let claims = match self.jwt.verify(token, now) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "bearer token rejected");
                return Principal::anonymous();
            }
        };

        let user = match self.directory.find_by_id(claims.nameid) {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!(user_id = %claims.nameid, "token subject no longer exists");
                return Principal::anonymous();
            }
            Err(e) => {
                warn!(user_id = %claims.nameid, error = %e, "could not load token subject");
                return Principal::anonymous();
            }
        };

        if claims.stamp != user.valid_token_stamp {
            debug!(
                user_id = %user.id,
                reason = ?user.token_invalidation_reason,
                "token stamp is stale"
            );
            return Principal::revoked(user.token_invalidation_reason);
        }

        let Some(expires_at) = claims.expires_at() else {
            return Principal::anonymous();
        };

        Principal::Authenticated(Identity {
            user_id: user.id,
            username: claims.unique_name,
            token_id: claims.jti,
            stamp: claims.stamp,
            expires_at,
        })
    }

    /// Invalidate every outstanding token of `user`. Returns the new stamp.
    pub fn revoke(&self, user: &User, reason: TokenInvalidationReason) -> AuthResult<Stamp> {
        self.revoke_by_id(user.id, reason)
    }

    pub fn revoke_by_id(&self, user_id: UserId, reason: TokenInvalidationReason) -> AuthResult<Stamp> {
        let user = self
            .directory
            .rotate_stamps(user_id, reason)
            .map_err(|e| AuthError::store(UPDATING_USER, e))?;

        info!(user_id = %user_id, reason = %reason, "revoked session tokens");
        Ok(user.valid_token_stamp)
    }
}
