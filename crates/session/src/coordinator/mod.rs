//! Single-flight re-authentication coordinator.
//!
//! When a credential expires mid-flight, the first call to observe the
//! expiry opens the re-authentication prompt; every further expiry that
//! arrives while the prompt is outstanding just parks behind it. When the
//! prompt closes, all parked calls see the same outcome: replay with the
//! renewed credential, or abandon together.
//!
//! The "one prompt at a time" rule is an explicit guard on the state
//! machine here, not a side effect of stream plumbing: the state mutex
//! holds either `Idle` or `PromptOutstanding` with the queue of parked
//! resolution handles, and only the caller that performed the
//! `Idle -> PromptOutstanding` transition drives the prompt.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use souk_core::{Credential, IdentityHint};

use crate::session::SessionStore;

/// How the re-authentication prompt closed.
#[derive(Debug, Clone)]
pub enum PromptOutcome {
    /// The user re-entered their password; a renewed credential (and the
    /// refreshed identity it authenticates) came back.
    Success {
        /// The renewed credential.
        credential: Credential,
    },
    /// The user dismissed the prompt. The prompt is responsible for having
    /// invoked the session store's logout path before resolving (contract,
    /// not enforced here); the coordinator only fans out the abandonment.
    Cancelled,
}

/// The visual re-authentication form (external collaborator).
///
/// Given the last-known identity hint, collects a secret and resolves with
/// either a renewed credential or a cancellation. There is deliberately no
/// timeout: an unanswered prompt suspends calls indefinitely, because
/// silently losing requests is worse than waiting.
#[async_trait]
pub trait ReauthPrompt: Send + Sync {
    /// Open the prompt seeded with `hint` and wait for the user.
    async fn authenticate(&self, hint: IdentityHint) -> PromptOutcome;
}

/// The outcome every suspended call resolves with.
#[derive(Debug, Clone)]
pub enum ReauthOutcome {
    /// Re-authentication succeeded; replay with this credential.
    Renewed(Credential),
    /// The prompt was cancelled; resolve as an aborted call, not an error
    /// toast per call (the prompt's cancel handler already navigated away).
    Aborted,
    /// No identity hint could be recovered; the session was cleared and
    /// the triggering call fails. Never fans out: this path is taken
    /// before any prompt opens.
    SessionLost,
}

enum CoordinatorState {
    Idle,
    PromptOutstanding {
        /// Resolution handles of the suspended calls, owned exclusively by
        /// the coordinator until the prompt closes.
        waiters: Vec<oneshot::Sender<ReauthOutcome>>,
    },
}

/// What `recover` decided to do under the state lock.
enum Entry {
    /// A prompt is already outstanding; park and wait.
    Park(oneshot::Receiver<ReauthOutcome>),
    /// First expiry with a recoverable hint; drive the prompt.
    Drive(IdentityHint),
    /// First expiry with no recoverable hint; hard logout.
    Lost,
}

/// Single-flight re-authentication state machine.
#[derive(Clone)]
pub struct ReauthCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    session: SessionStore,
    prompt: Arc<dyn ReauthPrompt>,
    state: Mutex<CoordinatorState>,
}

impl ReauthCoordinator {
    /// Create a coordinator over the session store and prompt collaborator.
    #[must_use]
    pub fn new(session: SessionStore, prompt: Arc<dyn ReauthPrompt>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                session,
                prompt,
                state: Mutex::new(CoordinatorState::Idle),
            }),
        }
    }

    /// Whether a prompt is currently outstanding.
    #[must_use]
    pub fn prompt_outstanding(&self) -> bool {
        matches!(
            &*self.inner.state.lock(),
            CoordinatorState::PromptOutstanding { .. }
        )
    }

    /// Recover from an observed credential expiry.
    ///
    /// Exactly one caller per cycle drives the prompt; every concurrent
    /// caller parks and resolves with the same outcome. Both the request
    /// authenticator and the proactive startup check enter through here,
    /// so the two paths share the single-flight guard.
    pub async fn recover(&self) -> ReauthOutcome {
        let entry = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                CoordinatorState::PromptOutstanding { waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    tracing::debug!(parked = waiters.len(), "expiry while prompt outstanding");
                    Entry::Park(rx)
                }
                CoordinatorState::Idle => {
                    // Hint comes from persisted state: the in-memory slot
                    // may already be stale by the time the expiry surfaced.
                    match self.inner.session.persisted_hint() {
                        Some(hint) => {
                            *state = CoordinatorState::PromptOutstanding {
                                waiters: Vec::new(),
                            };
                            Entry::Drive(hint)
                        }
                        None => Entry::Lost,
                    }
                }
            }
        };

        match entry {
            Entry::Park(rx) => {
                // First (and only) value; if the driver vanished without
                // resolving, the call is abandoned like a cancellation.
                rx.await.unwrap_or(ReauthOutcome::Aborted)
            }
            Entry::Drive(hint) => self.drive_prompt(hint).await,
            Entry::Lost => {
                // Terminal: never reaches PromptOutstanding.
                tracing::warn!("credential expired with no recoverable identity, logging out");
                if let Err(error) = self.inner.session.logout_all(true) {
                    tracing::warn!(%error, "hard logout failed to clear persisted state");
                }
                ReauthOutcome::SessionLost
            }
        }
    }

    async fn drive_prompt(&self, hint: IdentityHint) -> ReauthOutcome {
        tracing::info!(role = %hint.role, "opening re-authentication prompt");
        let outcome = match self.inner.prompt.authenticate(hint).await {
            PromptOutcome::Success { credential } => {
                // Persist before releasing anyone: subsequent calls and
                // other tabs must see the renewed credential.
                if let Err(error) = self.inner.session.set_credential(&credential) {
                    tracing::warn!(%error, "renewed credential could not be persisted");
                }
                ReauthOutcome::Renewed(credential)
            }
            PromptOutcome::Cancelled => {
                tracing::info!("re-authentication cancelled");
                ReauthOutcome::Aborted
            }
        };

        let waiters = {
            let mut state = self.inner.state.lock();
            match std::mem::replace(&mut *state, CoordinatorState::Idle) {
                CoordinatorState::PromptOutstanding { waiters } => waiters,
                CoordinatorState::Idle => Vec::new(),
            }
        };
        tracing::debug!(released = waiters.len(), "prompt resolved, draining queue");
        for waiter in waiters {
            // A parked call that gave up (dropped receiver) is its own
            // problem; everyone else still gets the outcome.
            let _ = waiter.send(outcome.clone());
        }
        outcome
    }
}
