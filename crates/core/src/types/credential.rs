//! Bearer credential types.
//!
//! The credential is an opaque bearer token plus the identity it
//! authenticates. The token is never verified client-side; the only field
//! ever read out of it is the `exp` claim, for the proactive startup check.
//! Authoritative expiry always comes from the server's expiry signal.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::types::email::Email;
use crate::types::identity::{IdentityRecord, Role};

/// A bearer token and the identity it authenticates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque bearer token, attached as `Authorization: Bearer <token>`.
    pub token: String,
    /// The identity this token authenticates.
    pub identity: IdentityRecord,
}

impl Credential {
    /// Create a credential from a token and the identity it belongs to.
    #[must_use]
    pub const fn new(token: String, identity: IdentityRecord) -> Self {
        Self { token, identity }
    }

    /// The expiry instant embedded in the token's `exp` claim, if any.
    ///
    /// Decodes the JWT payload without verifying the signature. Tokens that
    /// are not three dot-separated base64url segments, or whose payload has
    /// no numeric `exp`, report no expiry.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        token_expiry(&self.token)
    }

    /// Whether the token's own `exp` claim is at or before `now`.
    ///
    /// A token with no readable expiry is treated as not expired; the
    /// server-side expiry signal remains the authoritative check.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }
}

/// The `exp` claim (seconds since the epoch) of an unverified JWT.
#[must_use]
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut segments = token.split('.');
    let (_header, payload) = (segments.next()?, segments.next()?);
    segments.next()?;

    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    Utc.timestamp_opt(exp, 0).single()
}

/// The last-known `{email, role}` pair the re-authentication prompt is
/// seeded with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityHint {
    /// Address the user signed in with.
    pub email: Email,
    /// Which role's sign-in flow to re-run.
    pub role: Role,
}
