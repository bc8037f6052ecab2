//! Failure taxonomy of the authentication core.
//!
//! Every failure carries a user-facing message key and a technical code. The
//! technical code is a stable identifier safe to return; raw store diagnostics
//! travel separately in `detail` and are only ever logged.

use serde::Serialize;
use thiserror::Error;

use keystone_core::StoreError;

use crate::user::{TokenInvalidationReason, UserStatus};

/// Failure category, mapped to a fixed status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    InvalidLogin,
    LoginTimeout,
    ServerError,
}

impl Fault {
    pub fn status_code(self) -> u16 {
        match self {
            Fault::BadRequest => 400,
            Fault::Unauthorized => 401,
            Fault::Forbidden => 403,
            Fault::NotFound => 404,
            Fault::InvalidLogin => 412,
            Fault::LoginTimeout => 440,
            Fault::ServerError => 500,
        }
    }

    /// Wire code. Invalid logins share `UNAUTHORIZED` with missing sessions;
    /// the status code tells them apart.
    pub fn code(self) -> &'static str {
        match self {
            Fault::BadRequest => "BAD_REQUEST",
            Fault::Unauthorized | Fault::InvalidLogin => "UNAUTHORIZED",
            Fault::Forbidden => "FORBIDDEN",
            Fault::NotFound => "NOT_FOUND",
            Fault::LoginTimeout => "LOGIN_TIMEOUT",
            Fault::ServerError => "SERVER_ERROR",
        }
    }
}

/// Why a login attempt was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    #[error("user '{0}' not found")]
    UserNotFound(String),

    #[error("account has no password set")]
    AccountNotConfirmed,

    #[error("account status is {0}")]
    AccountStatusError(UserStatus),

    #[error("account locked out")]
    AccountLockedOut,

    #[error("login not allowed")]
    LoginNotAllowed,

    #[error("two-factor authentication required")]
    TwoFactorRequired,

    #[error("invalid credentials")]
    InvalidCredentials,
}

impl LoginFailure {
    fn user_message(&self) -> &'static str {
        match self {
            LoginFailure::UserNotFound(_) => "USER_MESSAGE_USER_NOT_FOUND",
            LoginFailure::AccountStatusError(_) => "USER_MESSAGE_ACCOUNT_STATUS_ERROR",
            _ => "SERVER_EXCEPTION_INVALID_LOGIN",
        }
    }

    fn technical_message(&self) -> String {
        match self {
            LoginFailure::UserNotFound(name) => name.clone(),
            LoginFailure::AccountNotConfirmed => "TECHNICAL_MESSAGE_ACCOUNT_NOT_CONFIRMED".into(),
            LoginFailure::AccountStatusError(status) => status.to_string(),
            LoginFailure::AccountLockedOut => "TECHNICAL_MESSAGE_ACCOUNT_LOCKED_OUT".into(),
            LoginFailure::LoginNotAllowed => "TECHNICAL_MESSAGE_ACCOUNT_LOGIN_NOT_ALLOWED".into(),
            LoginFailure::TwoFactorRequired => "TECHNICAL_MESSAGE_TWO_FACTOR_AUTH_REQUIRED".into(),
            LoginFailure::InvalidCredentials => String::new(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("bad request: {user_message}")]
    BadRequest {
        user_message: String,
        technical_message: String,
    },

    #[error("unauthorized")]
    Unauthorized {
        reason: Option<TokenInvalidationReason>,
    },

    #[error("forbidden: missing permission '{permission}'")]
    Forbidden { permission: String },

    #[error("{user_message}: {name}")]
    NotFound {
        user_message: &'static str,
        name: String,
    },

    #[error("invalid login: {0}")]
    InvalidLogin(#[from] LoginFailure),

    #[error("session timed out after inactivity")]
    LoginTimeout,

    #[error("{technical_message}: {detail}")]
    General {
        user_message: String,
        technical_message: String,
        detail: String,
    },
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    pub fn bad_request(user_message: impl Into<String>) -> Self {
        Self::BadRequest {
            user_message: user_message.into(),
            technical_message: String::new(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::Unauthorized { reason: None }
    }

    pub fn not_found(user_message: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            user_message,
            name: name.into(),
        }
    }

    /// Wrap a persistence failure. `technical_message` names the operation.
    pub fn store(technical_message: &'static str, err: StoreError) -> Self {
        Self::General {
            user_message: "SERVER_EXCEPTION_SERVER_ERROR".to_string(),
            technical_message: technical_message.to_string(),
            detail: err.to_string(),
        }
    }

    pub fn fault(&self) -> Fault {
        match self {
            AuthError::BadRequest { .. } => Fault::BadRequest,
            AuthError::Unauthorized { .. } => Fault::Unauthorized,
            AuthError::Forbidden { .. } => Fault::Forbidden,
            AuthError::NotFound { .. } => Fault::NotFound,
            AuthError::InvalidLogin(_) => Fault::InvalidLogin,
            AuthError::LoginTimeout => Fault::LoginTimeout,
            AuthError::General { .. } => Fault::ServerError,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.fault().status_code()
    }

    pub fn user_message(&self) -> String {
        match self {
            AuthError::BadRequest { user_message, .. } => user_message.clone(),
            AuthError::Unauthorized { reason: Some(_) } => "USER_MESSAGE_AUTO_LOGOUT".into(),
            AuthError::Unauthorized { reason: None } => "SERVER_EXCEPTION_UNAUTHORIZED".into(),
            AuthError::Forbidden { .. } => "SERVER_EXCEPTION_FORBIDDEN".into(),
            AuthError::NotFound { user_message, .. } => (*user_message).to_string(),
            AuthError::InvalidLogin(f) => f.user_message().to_string(),
            AuthError::LoginTimeout => "SERVER_EXCEPTION_LOGIN_TIMEOUT".into(),
            AuthError::General { user_message, .. } => user_message.clone(),
        }
    }

    pub fn technical_message(&self) -> String {
        match self {
            AuthError::BadRequest {
                technical_message, ..
            } => technical_message.clone(),
            AuthError::Unauthorized { reason: Some(r) } => {
                format!("TECHNICAL_MESSAGE_TOKEN_INVALIDATED_{}", r.as_str())
            }
            AuthError::Unauthorized { reason: None } => String::new(),
            AuthError::Forbidden { .. } => "TECHNICAL_MESSAGE_MISSING_PERMISSION".into(),
            AuthError::NotFound { name, .. } => name.clone(),
            AuthError::InvalidLogin(f) => f.technical_message(),
            AuthError::LoginTimeout => String::new(),
            AuthError::General {
                technical_message, ..
            } => technical_message.clone(),
        }
    }

    pub fn invalidation_reason(&self) -> Option<TokenInvalidationReason> {
        match self {
            AuthError::Unauthorized { reason } => *reason,
            _ => None,
        }
    }

    /// Diagnostic text meant for logs only.
    pub fn detail(&self) -> Option<&str> {
        match self {
            AuthError::General { detail, .. } => Some(detail),
            _ => None,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            fault: self.fault().code(),
            user_message: self.user_message(),
            technical_message: self.technical_message(),
            token_invalidation_reason: self.invalidation_reason(),
        }
    }
}

/// Structured error body returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub fault: &'static str,
    pub user_message: String,
    pub technical_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_invalidation_reason: Option<TokenInvalidationReason>,
}
