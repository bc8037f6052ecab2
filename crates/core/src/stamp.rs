use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, randomly regenerated revocation marker.
///
/// The user record holds the current stamp; every issued token embeds the
/// stamp that was current at issue time. A mismatch means the token was
/// revoked. Stamps are random (v4), never time-ordered, so they cannot be
/// guessed from an issue time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stamp(Uuid);

impl Stamp {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl core::fmt::Display for Stamp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for Stamp {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}
