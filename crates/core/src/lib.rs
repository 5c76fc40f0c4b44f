//! Souk Core - Shared types library.
//!
//! This crate provides the common types used across the Souk client
//! components:
//! - `session` - Authenticated-session coordination (stores, interceptor)
//! - `integration-tests` - End-to-end coordination tests
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage
//! access. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, identity records, credentials, and the
//!   cross-tab message/key contract

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
