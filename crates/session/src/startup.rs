//! Proactive credential-expiry check at application start.
//!
//! Rather than letting the user navigate into the first failed request,
//! the stored token's own `exp` claim is checked right after the persisted
//! session loads. An expired claim runs the same single-flight recovery
//! the request pipeline uses — the coordinator's guard covers both paths,
//! so a request racing the startup check parks behind the startup prompt
//! instead of opening a second one.
//!
//! This is a UX optimization only: the server's expiry signal remains the
//! authoritative check, and a token with no readable claim is left for the
//! reactive path to deal with.

use chrono::Utc;

use souk_core::token_expiry;

use crate::coordinator::{ReauthCoordinator, ReauthOutcome};
use crate::session::{SessionError, SessionStore};

/// What the startup check concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// Nothing persisted; the visitor starts logged out.
    NoSession,
    /// A session loaded and its credential is still good (or unreadable,
    /// in which case the reactive path is the judge).
    Active,
    /// The credential had expired; the user re-authenticated at startup.
    Renewed,
    /// The credential had expired and the session ended (prompt cancelled,
    /// or no identity was recoverable and the store was silently cleared).
    SignedOut,
}

/// Restore the persisted session and verify its credential.
///
/// # Errors
///
/// Returns [`SessionError`] if the persistent store cannot be read while
/// loading. Recovery-path failures are not errors; they surface in the
/// returned [`ResumeOutcome`].
pub async fn resume_session(
    session: &SessionStore,
    coordinator: &ReauthCoordinator,
) -> Result<ResumeOutcome, SessionError> {
    let loaded = session.load_from_persistent_store()?;

    let Some(token) = session.token() else {
        return Ok(if loaded.is_some() {
            ResumeOutcome::Active
        } else {
            ResumeOutcome::NoSession
        });
    };

    let Some(expires_at) = token_expiry(&token) else {
        // Opaque token: nothing to check proactively.
        return Ok(ResumeOutcome::Active);
    };
    if expires_at > Utc::now() {
        return Ok(ResumeOutcome::Active);
    }

    tracing::info!(%expires_at, "stored credential already expired at startup");
    match coordinator.recover().await {
        ReauthOutcome::Renewed(_) => Ok(ResumeOutcome::Renewed),
        ReauthOutcome::Aborted | ReauthOutcome::SessionLost => Ok(ResumeOutcome::SignedOut),
    }
}
