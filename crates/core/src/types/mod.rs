//! Core types for the Souk client.
//!
//! Type-safe wrappers for the domain concepts the session layer moves
//! around: identities, credentials, and the cross-tab wire contract.

pub mod credential;
pub mod email;
pub mod id;
pub mod identity;
pub mod message;
pub mod storage_keys;

pub use credential::{Credential, IdentityHint, token_expiry};
pub use email::{Email, EmailError};
pub use id::*;
pub use identity::{
    AdminProfile, CustomerProfile, IdentityRecord, Role, RoleParseError, VendorProfile,
};
pub use message::{BroadcastMessage, logical_clock_now};
