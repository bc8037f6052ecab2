//! User record as seen by the authentication core.
//!
//! The credential directory owns these records; the core only reads them and
//! writes back the revocation/lockout/activity fields it is responsible for.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use keystone_core::{Stamp, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// User Status
// ─────────────────────────────────────────────────────────────────────────────

/// Account status. Only `Active` accounts may log in or make requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    /// Locked by the lockout policy or by an administrator.
    Locked,
    /// Signup never completed, or the account was retired.
    Expired,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Locked => "LOCKED",
            UserStatus::Expired => "EXPIRED",
        }
    }
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Token Invalidation Reason
// ─────────────────────────────────────────────────────────────────────────────

/// Why the user's outstanding tokens were last revoked.
///
/// Surfaced to clients so they can tell "your privileges changed" apart from a
/// generic authentication failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenInvalidationReason {
    None,
    UserModified,
    RoleModified,
    PermissionModified,
}

impl TokenInvalidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenInvalidationReason::None => "NONE",
            TokenInvalidationReason::UserModified => "USER_MODIFIED",
            TokenInvalidationReason::RoleModified => "ROLE_MODIFIED",
            TokenInvalidationReason::PermissionModified => "PERMISSION_MODIFIED",
        }
    }
}

impl core::fmt::Display for TokenInvalidationReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A user record.
///
/// # Invariants
/// - A token is usable only while its embedded stamp equals `valid_token_stamp`.
/// - `valid_token_stamp` and `security_stamp` always rotate together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub nickname: Option<String>,
    pub status: UserStatus,

    /// `None` until signup completes.
    pub password_hash: Option<String>,
    pub last_password_changed_time: Option<DateTime<Utc>>,

    pub last_request_time: DateTime<Utc>,
    pub valid_token_stamp: Stamp,
    pub security_stamp: Stamp,
    pub token_invalidation_reason: Option<TokenInvalidationReason>,

    // Lockout bookkeeping, maintained by the directory's own policy.
    pub access_failed_count: u32,
    pub lockout_end: Option<DateTime<Utc>>,
    pub email_confirmed: bool,
    pub two_factor_enabled: bool,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// A fresh record. New accounts start `Expired` with no password until an
    /// administrator activates them.
    pub fn new(username: impl Into<String>, email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            username: username.into(),
            email: email.into(),
            nickname: None,
            status: UserStatus::Expired,
            password_hash: None,
            last_password_changed_time: None,
            last_request_time: now,
            valid_token_stamp: Stamp::generate(),
            security_stamp: Stamp::generate(),
            token_invalidation_reason: None,
            access_failed_count: 0,
            lockout_end: None,
            email_confirmed: false,
            two_factor_enabled: false,
            created_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn has_password(&self) -> bool {
        self.password_hash
            .as_deref()
            .is_some_and(|h| !h.trim().is_empty())
    }

    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.lockout_end.is_some_and(|end| end > now)
    }

    /// Time elapsed since the last validated request.
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_request_time
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_request_time = now;
    }

    /// Rotate both stamps, invalidating every token issued so far.
    ///
    /// `TokenInvalidationReason::None` rotates without overwriting the
    /// previously recorded reason.
    pub fn rotate_stamps(&mut self, reason: TokenInvalidationReason) -> Stamp {
        self.valid_token_stamp = Stamp::generate();
        self.security_stamp = Stamp::generate();
        if reason != TokenInvalidationReason::None {
            self.token_invalidation_reason = Some(reason);
        }
        self.valid_token_stamp
    }
}
