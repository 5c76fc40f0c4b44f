//! Integration tests for the Souk session layer.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p souk-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `single_flight` - Concurrent expiry recovery: one prompt, shared
//!   outcome, replay and abort correctness
//! - `cross_tab` - Identity/cart/logout propagation between tabs over the
//!   shared persistent store
//! - `session_lifecycle` - Load precedence, idempotent logout, public
//!   endpoint bypass
//!
//! Everything runs in-process against `souk_session::storage::MemoryStore`
//! tab handles; no network or real browser storage is involved.

#![cfg_attr(not(test), forbid(unsafe_code))]
