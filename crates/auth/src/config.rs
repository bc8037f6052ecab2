use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum signing key length accepted for HS256.
pub const MIN_JWT_KEY_LENGTH: usize = 32;

/// Upper bounds keeping `now + duration` inside chrono's representable range.
pub const MAX_JWT_EXPIRE_DAYS: u32 = 3_650;
pub const MAX_INACTIVITY_MINUTES: u32 = 525_600;
pub const MAX_LOCKOUT_DAYS: u32 = 1_000_000;

/// Token, session and lockout policy.
///
/// Every value is supplied externally; only the policy knobs have defaults.
/// The signing key has none and [`AuthConfig::validate`] rejects an empty one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_key: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_expire_days: u32,

    /// Idle time after which a live session is rejected.
    pub inactivity_minutes: u32,

    /// Consecutive failed password checks before the account locks.
    pub max_failed_access_attempts: u32,
    pub lockout_days: u32,

    /// Refuse password sign-in until the email address is confirmed.
    pub require_confirmed_email: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_key: String::new(),
            jwt_issuer: "keystone".to_string(),
            jwt_audience: "keystone".to_string(),
            jwt_expire_days: 1,
            inactivity_minutes: 6,
            max_failed_access_attempts: 3,
            lockout_days: 365_000,
            require_confirmed_email: false,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_key.len() < MIN_JWT_KEY_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "jwt_key must be at least {MIN_JWT_KEY_LENGTH} bytes"
            )));
        }
        if self.jwt_issuer.trim().is_empty() {
            return Err(ConfigError::Invalid("jwt_issuer cannot be empty".into()));
        }
        if self.jwt_audience.trim().is_empty() {
            return Err(ConfigError::Invalid("jwt_audience cannot be empty".into()));
        }
        if self.jwt_expire_days == 0 {
            return Err(ConfigError::Invalid("jwt_expire_days must be positive".into()));
        }
        if self.jwt_expire_days > MAX_JWT_EXPIRE_DAYS {
            return Err(ConfigError::Invalid(format!(
                "jwt_expire_days cannot exceed {MAX_JWT_EXPIRE_DAYS}"
            )));
        }
        if self.inactivity_minutes == 0 {
            return Err(ConfigError::Invalid("inactivity_minutes must be positive".into()));
        }
        if self.inactivity_minutes > MAX_INACTIVITY_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "inactivity_minutes cannot exceed {MAX_INACTIVITY_MINUTES}"
            )));
        }
        if self.lockout_days > MAX_LOCKOUT_DAYS {
            return Err(ConfigError::Invalid(format!(
                "lockout_days cannot exceed {MAX_LOCKOUT_DAYS}"
            )));
        }
        if self.max_failed_access_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_failed_access_attempts must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn token_lifetime(&self) -> Duration {
        Duration::days(i64::from(self.jwt_expire_days))
    }

    pub fn inactivity_threshold(&self) -> Duration {
        Duration::minutes(i64::from(self.inactivity_minutes))
    }

    pub fn lockout_duration(&self) -> Duration {
        Duration::days(i64::from(self.lockout_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AuthConfig {
        AuthConfig {
            jwt_key: "k".repeat(MIN_JWT_KEY_LENGTH),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn defaults_match_policy() {
        let cfg = AuthConfig::default();
        assert_eq!(cfg.inactivity_threshold(), Duration::minutes(6));
        assert_eq!(cfg.max_failed_access_attempts, 3);
    }

    #[test]
    fn default_config_is_rejected_without_a_key() {
        assert!(AuthConfig::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn short_key_is_rejected() {
        let cfg = AuthConfig {
            jwt_key: "short".into(),
            ..valid()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("jwt_key"));
    }

    #[test]
    fn oversized_durations_are_rejected() {
        let cfg = AuthConfig {
            lockout_days: u32::MAX,
            ..valid()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("lockout_days"));

        let cfg = AuthConfig {
            jwt_expire_days: MAX_JWT_EXPIRE_DAYS + 1,
            ..valid()
        };
        assert!(cfg.validate().is_err());

        let cfg = AuthConfig {
            lockout_days: MAX_LOCKOUT_DAYS,
            ..valid()
        };
        assert!(cfg.validate().is_ok());
        let far = chrono::Utc::now().checked_add_signed(cfg.lockout_duration());
        assert!(far.is_some());
    }

    #[test]
    fn zero_inactivity_is_rejected() {
        let cfg = AuthConfig {
            inactivity_minutes: 0,
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }
}
