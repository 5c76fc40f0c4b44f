//! Souk session coordination layer.
//!
//! Keeps a logged-in identity consistent across every tab of the same
//! origin, and guarantees that when the session credential expires
//! mid-flight, any number of in-progress API calls are suspended behind
//! exactly one re-authentication prompt and then replayed or abandoned
//! together.
//!
//! # Components
//!
//! - [`storage`] - The shared persistent key/value store every tab sees
//! - [`broadcast`] - Message protocol layered on the store's change feed
//! - [`session`] - The authoritative reactive session store
//! - [`transport`] - HTTP transport seam (reqwest-backed in production)
//! - [`api`] - Request authenticator: credential attachment + expiry
//!   detection
//! - [`coordinator`] - Single-flight re-authentication state machine
//! - [`startup`] - Proactive credential-expiry check at application start
//! - [`config`] - Environment-driven configuration

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod broadcast;
pub mod config;
pub mod coordinator;
pub mod session;
pub mod startup;
pub mod storage;
pub mod transport;
