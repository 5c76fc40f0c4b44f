//! Request authenticator.
//!
//! The pipeline stage every outgoing API call goes through: attaches the
//! current bearer credential unless the call targets a public endpoint,
//! classifies auth-related failures, and hands expired-credential failures
//! to the re-authentication coordinator, replaying the original request
//! once recovery produces a renewed credential.

mod error;

pub use error::ApiError;

use std::sync::Arc;

use crate::config::SessionConfig;
use crate::coordinator::{ReauthCoordinator, ReauthOutcome};
use crate::session::SessionStore;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Response header distinguishing "expired" from a generic 401.
///
/// The server sets it to `true` when the rejection is specifically due to
/// token expiry; the single-flight recovery depends on this distinction.
pub const TOKEN_EXPIRED_HEADER: &str = "x-token-expired";

const AUTHORIZATION: &str = "authorization";

/// How a response relates to the authentication machinery.
enum Disposition {
    Success,
    Expired,
    Unauthorized,
    Forbidden,
    Failed,
}

fn classify(response: &ApiResponse) -> Disposition {
    match response.status {
        200..=299 => Disposition::Success,
        401 => {
            if response
                .header(TOKEN_EXPIRED_HEADER)
                .is_some_and(|v| v.eq_ignore_ascii_case("true"))
            {
                Disposition::Expired
            } else {
                Disposition::Unauthorized
            }
        }
        403 => Disposition::Forbidden,
        _ => Disposition::Failed,
    }
}

/// Authenticated API client.
///
/// Cheaply cloneable; clones share the transport, session store, and
/// coordinator.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    transport: Arc<dyn Transport>,
    session: SessionStore,
    coordinator: ReauthCoordinator,
    public_endpoints: Vec<String>,
}

impl ApiClient {
    /// Create a client over the given transport and coordination layer.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        session: SessionStore,
        coordinator: ReauthCoordinator,
        config: &SessionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ApiClientInner {
                transport,
                session,
                coordinator,
                public_endpoints: config.public_endpoints.clone(),
            }),
        }
    }

    /// Whether `url` targets a public endpoint (allow-list, substring
    /// match). Public calls carry no credential and never participate in
    /// expiry handling, even if one happens to return a 401.
    #[must_use]
    pub fn is_public(&self, url: &str) -> bool {
        self.inner
            .public_endpoints
            .iter()
            .any(|pattern| url.contains(pattern.as_str()))
    }

    /// Send `request` through the authenticated pipeline.
    ///
    /// Non-public requests carry `Authorization: Bearer <token>` when a
    /// token is known. A 401 flagged as expired suspends the call behind
    /// the coordinator's single prompt; on renewal the original request is
    /// replayed with the new credential and that result returned to the
    /// caller.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] per the taxonomy on that type; every 2xx
    /// response is `Ok`.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let public = self.is_public(&request.url);
        let response = self
            .inner
            .transport
            .execute(self.attach(request.clone(), public))
            .await?;

        match classify(&response) {
            Disposition::Success => Ok(response),
            Disposition::Expired if !public => self.recover_and_replay(request).await,
            // A public endpoint answering 401 is just an error, expired
            // flag or not.
            Disposition::Expired | Disposition::Unauthorized => Err(ApiError::Unauthorized),
            Disposition::Forbidden => Err(ApiError::Forbidden),
            Disposition::Failed => Err(ApiError::Status {
                status: response.status,
                body: response.body,
            }),
        }
    }

    fn attach(&self, mut request: ApiRequest, public: bool) -> ApiRequest {
        if !public
            && let Some(token) = self.inner.session.token()
        {
            request
                .headers
                .push((AUTHORIZATION.to_owned(), format!("Bearer {token}")));
        }
        request
    }

    async fn recover_and_replay(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        tracing::debug!(url = %request.url, "request hit expired credential, suspending");
        match self.inner.coordinator.recover().await {
            ReauthOutcome::Renewed(credential) => {
                let mut replay = request;
                replay.headers.push((
                    AUTHORIZATION.to_owned(),
                    format!("Bearer {}", credential.token),
                ));
                tracing::debug!(url = %replay.url, "replaying with renewed credential");
                let response = self.inner.transport.execute(replay).await?;
                match classify(&response) {
                    Disposition::Success => Ok(response),
                    // A second expiry right after renewal is not recovered
                    // again; one prompt per call is the contract.
                    Disposition::Expired | Disposition::Unauthorized => {
                        Err(ApiError::Unauthorized)
                    }
                    Disposition::Forbidden => Err(ApiError::Forbidden),
                    Disposition::Failed => Err(ApiError::Status {
                        status: response.status,
                        body: response.body,
                    }),
                }
            }
            ReauthOutcome::Aborted => Err(ApiError::Aborted),
            ReauthOutcome::SessionLost => Err(ApiError::SessionLost),
        }
    }
}
