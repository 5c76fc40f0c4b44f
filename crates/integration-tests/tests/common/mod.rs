//! Shared fixtures for the session-layer integration tests.

// Not every test binary uses every fixture.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use souk_core::{
    Credential, CustomerId, CustomerProfile, Email, IdentityHint, IdentityRecord, VendorId,
    VendorProfile,
};
use souk_session::api::{ApiClient, TOKEN_EXPIRED_HEADER};
use souk_session::config::SessionConfig;
use souk_session::coordinator::{PromptOutcome, ReauthCoordinator, ReauthPrompt};
use souk_session::session::SessionStore;
use souk_session::storage::MemoryStore;
use souk_session::transport::{ApiRequest, ApiResponse, Transport, TransportError};

/// Install the test subscriber once so `RUST_LOG=debug` surfaces the
/// session layer's tracing events during a failing run.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn customer(email: &str, name: &str) -> IdentityRecord {
    IdentityRecord::Customer(CustomerProfile {
        id: CustomerId::generate(),
        email: Email::parse(email).expect("fixture email"),
        display_name: name.to_owned(),
        cart_item_ids: vec![],
        wishlist_item_ids: vec![],
    })
}

pub fn vendor(email: &str, shop: &str) -> IdentityRecord {
    IdentityRecord::Vendor(VendorProfile {
        id: VendorId::generate(),
        email: Email::parse(email).expect("fixture email"),
        shop_name: shop.to_owned(),
    })
}

/// Transport that accepts exactly one bearer token and rejects everything
/// else with the expiry signal. Records every request it sees.
pub struct TokenAwareTransport {
    valid_token: Mutex<String>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl TokenAwareTransport {
    pub fn new(valid_token: &str) -> Arc<Self> {
        Arc::new(Self {
            valid_token: Mutex::new(valid_token.to_owned()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_valid_token(&self, token: &str) {
        *self.valid_token.lock() = token.to_owned();
    }

    pub fn seen(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn bearer_of(request: &ApiRequest) -> Option<String> {
        request
            .headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case("authorization"))
            .map(|(_, v)| v.clone())
    }
}

#[async_trait]
impl Transport for TokenAwareTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let bearer = Self::bearer_of(&request);
        self.requests.lock().push(request);

        let expected = format!("Bearer {}", self.valid_token.lock());
        if bearer.as_deref() == Some(expected.as_str()) {
            Ok(ApiResponse {
                status: 200,
                headers: vec![],
                body: r#"{"ok":true}"#.to_owned(),
            })
        } else {
            Ok(ApiResponse {
                status: 401,
                headers: vec![(TOKEN_EXPIRED_HEADER.to_owned(), "true".to_owned())],
                body: String::new(),
            })
        }
    }
}

/// Prompt gated behind a test-controlled semaphore, honoring the prompt
/// contract: on cancellation it runs the session store's logout path
/// before resolving.
pub struct GatedPrompt {
    opened: AtomicUsize,
    gate: tokio::sync::Semaphore,
    outcome: Mutex<Option<PromptOutcome>>,
    session: SessionStore,
}

impl GatedPrompt {
    pub fn new(session: SessionStore) -> Arc<Self> {
        Arc::new(Self {
            opened: AtomicUsize::new(0),
            gate: tokio::sync::Semaphore::new(0),
            outcome: Mutex::new(None),
            session,
        })
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn release(&self, outcome: PromptOutcome) {
        *self.outcome.lock() = Some(outcome);
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl ReauthPrompt for GatedPrompt {
    async fn authenticate(&self, _hint: IdentityHint) -> PromptOutcome {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();
        let outcome = self
            .outcome
            .lock()
            .clone()
            .unwrap_or(PromptOutcome::Cancelled);
        if matches!(outcome, PromptOutcome::Cancelled) {
            // The prompt's cancel handler logs the session out before the
            // dialog closes; the coordinator only fans the abort out.
            self.session
                .logout_all(true)
                .expect("logout during cancellation");
        }
        outcome
    }
}

/// One fully wired "tab": storage handle, session store, coordinator,
/// gated prompt, and an API client over a token-aware transport.
pub struct Tab {
    pub storage: MemoryStore,
    pub session: SessionStore,
    pub coordinator: ReauthCoordinator,
    pub prompt: Arc<GatedPrompt>,
    pub transport: Arc<TokenAwareTransport>,
    pub client: ApiClient,
}

impl Tab {
    /// Wire a tab over the given storage handle.
    pub fn over(storage: MemoryStore, valid_token: &str) -> Self {
        init_tracing();
        let session = SessionStore::new(Arc::new(storage.clone()));
        let prompt = GatedPrompt::new(session.clone());
        let coordinator = ReauthCoordinator::new(session.clone(), prompt.clone());
        let transport = TokenAwareTransport::new(valid_token);
        let config = SessionConfig::new("https://api.souk.example");
        let client = ApiClient::new(
            transport.clone(),
            session.clone(),
            coordinator.clone(),
            &config,
        );
        Self {
            storage,
            session,
            coordinator,
            prompt,
            transport,
            client,
        }
    }

    pub fn new(valid_token: &str) -> Self {
        Self::over(MemoryStore::new(), valid_token)
    }

    /// Log a credential and identity in, as a completed sign-in would.
    pub fn login(&self, token: &str, identity: IdentityRecord) {
        self.session
            .set_credential(&Credential::new(token.to_owned(), identity))
            .expect("login fixture");
    }
}
