use chrono::{DateTime, Utc};

use keystone_core::{Stamp, TokenId, UserId};

use crate::user::TokenInvalidationReason;

/// Identity carried by a token that passed every validation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
    pub token_id: TokenId,
    pub stamp: Stamp,
    pub expires_at: DateTime<Utc>,
}

/// Result of validating a bearer token. Built fresh per call and never
/// mutated afterwards.
///
/// A structurally valid but revoked token yields `Anonymous`, optionally with
/// the reason recorded on the user at revocation time, so the caller can
/// decide how to challenge instead of failing hard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Authenticated(Identity),
    Anonymous {
        invalidation_reason: Option<TokenInvalidationReason>,
    },
}

impl Principal {
    pub fn anonymous() -> Self {
        Principal::Anonymous {
            invalidation_reason: None,
        }
    }

    pub fn revoked(reason: Option<TokenInvalidationReason>) -> Self {
        Principal::Anonymous {
            invalidation_reason: reason,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Principal::Authenticated(identity) => Some(identity),
            Principal::Anonymous { .. } => None,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.identity().map(|i| i.user_id)
    }

    pub fn invalidation_reason(&self) -> Option<TokenInvalidationReason> {
        match self {
            Principal::Authenticated(_) => None,
            Principal::Anonymous {
                invalidation_reason,
            } => *invalidation_reason,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Principal::Authenticated(_))
    }
}
