//! Request-pipeline error types.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced to callers of the authenticated API client.
///
/// The variants mirror the recovery taxonomy: only an expiry on a
/// non-public endpoint ever engages the re-authentication machinery;
/// everything else propagates unchanged.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Generic authentication failure (bad password, bad admin code).
    /// Never triggers re-authentication: the user may be mid-login.
    #[error("unauthorized")]
    Unauthorized,

    /// Valid credential, insufficient permission. Never triggers
    /// re-authentication.
    #[error("forbidden")]
    Forbidden,

    /// The credential expired and the re-authentication prompt was
    /// cancelled; the call is abandoned, not failed loudly (the cancel
    /// handler already navigated to a logged-out state).
    #[error("request abandoned: sign-in was cancelled")]
    Aborted,

    /// The credential expired and no identity hint could be recovered;
    /// the session was cleared and the call fails.
    #[error("session expired with no recoverable identity")]
    SessionLost,

    /// Any other non-success status.
    #[error("request failed with status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
}
