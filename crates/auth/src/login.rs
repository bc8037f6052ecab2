//! Password login as an explicit state machine.
//!
//! Each check is one state; the order is fixed so that account status is
//! always reported before any password is compared.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::directory::{CredentialDirectory, PasswordVerification};
use crate::error::{AuthError, AuthResult, LoginFailure};
use crate::registry::RoleRegistry;
use crate::roles::RoleView;
use crate::token::{IssuedToken, TokenService};
use crate::user::{User, UserStatus};

const READING_USER: &str = "TECHNICAL_MESSAGE_READING_USER";
const UPDATING_USER: &str = "TECHNICAL_MESSAGE_UPDATING_USER";

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub token: IssuedToken,
    pub user: User,
    pub roles: Vec<RoleView>,
}

#[derive(Debug)]
enum LoginState {
    ReceivedCredentials,
    CheckUserExists,
    CheckPasswordSet(User),
    CheckAccountStatus(User),
    CheckPassword(User),
    Authenticated(User),
}

pub struct LoginStateMachine {
    directory: Arc<dyn CredentialDirectory>,
    registry: Arc<RoleRegistry>,
    tokens: Arc<TokenService>,
}

impl LoginStateMachine {
    pub fn new(
        directory: Arc<dyn CredentialDirectory>,
        registry: Arc<RoleRegistry>,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            directory,
            registry,
            tokens,
        }
    }

    pub fn login(&self, credentials: &Credentials, now: DateTime<Utc>) -> AuthResult<LoginSuccess> {
        let mut state = LoginState::ReceivedCredentials;
        loop {
            state = match state {
                LoginState::Authenticated(user) => return self.complete(credentials, user, now),
                other => {
                    debug!(username = %credentials.username, state = state_name(&other), "login step");
                    self.advance(other, credentials, now)
                        .inspect_err(|e| warn!(username = %credentials.username, error = %e, "login refused"))?
                }
            };
        }
    }

    fn advance(
        &self,
        state: LoginState,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> AuthResult<LoginState> {
        match state {
            LoginState::ReceivedCredentials => {
                if credentials.username.trim().is_empty() {
                    return Err(AuthError::bad_request("USER_MESSAGE_USERNAME_REQUIRED"));
                }
                if credentials.password.is_empty() {
                    return Err(AuthError::bad_request("USER_MESSAGE_PASSWORD_REQUIRED"));
                }
                Ok(LoginState::CheckUserExists)
            }
            LoginState::CheckUserExists => {
                let user = self
                    .directory
                    .find_by_username(&credentials.username)
                    .map_err(|e| AuthError::store(READING_USER, e))?
                    .ok_or_else(|| LoginFailure::UserNotFound(credentials.username.clone()))?;
                Ok(LoginState::CheckPasswordSet(user))
            }
            LoginState::CheckPasswordSet(user) => {
                if !user.has_password() {
                    return Err(LoginFailure::AccountNotConfirmed.into());
                }
                Ok(LoginState::CheckAccountStatus(user))
            }
            LoginState::CheckAccountStatus(user) => {
                if !user.is_active() {
                    return Err(LoginFailure::AccountStatusError(user.status).into());
                }
                Ok(LoginState::CheckPassword(user))
            }
            LoginState::CheckPassword(user) => {
                let outcome = self
                    .directory
                    .verify_password(user.id, &credentials.password, now)
                    .map_err(|e| AuthError::store(READING_USER, e))?;
                match outcome {
                    PasswordVerification::Succeeded => Ok(LoginState::Authenticated(user)),
                    PasswordVerification::LockedOut => {
                        self.lock(&user)?;
                        Err(LoginFailure::AccountLockedOut.into())
                    }
                    PasswordVerification::NotAllowed => Err(LoginFailure::LoginNotAllowed.into()),
                    PasswordVerification::RequiresSecondFactor => {
                        Err(LoginFailure::TwoFactorRequired.into())
                    }
                    PasswordVerification::Failed => Err(LoginFailure::InvalidCredentials.into()),
                }
            }
            LoginState::Authenticated(user) => Ok(LoginState::Authenticated(user)),
        }
    }

    /// Mark the account LOCKED after the directory's lockout policy tripped.
    fn lock(&self, user: &User) -> AuthResult<()> {
        self.directory
            .set_status(user.id, UserStatus::Locked)
            .map_err(|e| AuthError::store(UPDATING_USER, e))?;
        warn!(user = %user.username, "account locked after repeated failures");
        Ok(())
    }

    fn complete(
        &self,
        credentials: &Credentials,
        user: User,
        now: DateTime<Utc>,
    ) -> AuthResult<LoginSuccess> {
        let roles = self.registry.roles_for_user(user.id)?;
        let token = self.tokens.issue(&credentials.username, &user, now)?;

        let user = self
            .directory
            .touch(user.id, now)
            .map_err(|e| AuthError::store(UPDATING_USER, e))?;

        info!(user = %user.username, token_id = %token.token_id, "login succeeded");
        Ok(LoginSuccess { token, user, roles })
    }
}

fn state_name(state: &LoginState) -> &'static str {
    match state {
        LoginState::ReceivedCredentials => "received_credentials",
        LoginState::CheckUserExists => "check_user_exists",
        LoginState::CheckPasswordSet(_) => "check_password_set",
        LoginState::CheckAccountStatus(_) => "check_account_status",
        LoginState::CheckPassword(_) => "check_password",
        LoginState::Authenticated(_) => "authenticated",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_the_password() {
        let creds = Credentials {
            username: "alice".into(),
            password: "hunter22".into(),
        };
        let out = format!("{creds:?}");
        assert!(out.contains("alice"));
        assert!(!out.contains("hunter22"));
    }
}
