//! The persistent-store key contract.
//!
//! These keys are shared by every tab of the same origin and are a stable
//! wire contract: renaming one orphans state written by older tabs.

/// Serialized [`IdentityRecord`](crate::IdentityRecord) for a customer.
pub const CUSTOMER: &str = "customer";

/// Serialized identity record for a vendor.
pub const VENDOR: &str = "vendor";

/// Serialized identity record for an admin.
pub const ADMIN: &str = "admin";

/// The current bearer token.
pub const JWT: &str = "jwt";

/// Legacy token alias, still read for sessions written by older clients.
pub const AUTH_TOKEN: &str = "auth_token";

/// Legacy token alias from the first client release.
pub const JWT_TOKEN: &str = "jwtToken";

/// Legacy per-role credential blobs (serialized `{token, identity}`).
pub const CUSTOMER_DATA: &str = "customer_data";
pub const VENDOR_DATA: &str = "vendor_data";
pub const ADMIN_DATA: &str = "admin_data";

/// Cart contents change message (`{count, items, timestamp}`).
pub const CART_UPDATE: &str = "cart_update";

/// Wishlist contents change message (`{count, items, timestamp}`).
pub const WISHLIST_UPDATE: &str = "wishlist_update";

/// Logout signal; the value is a timestamp with no payload semantics
/// beyond "something happened".
pub const LOGOUT_EVENT: &str = "logout_event";

/// Token lookup order for the request authenticator: first non-empty wins.
///
/// The aliases document a storage migration; all are still checked so that
/// a session written by an older client keeps working after an upgrade.
pub const TOKEN_FALLBACK_KEYS: [&str; 3] = [JWT, AUTH_TOKEN, JWT_TOKEN];

/// Every key `logout_all` clears.
pub const ALL_SESSION_KEYS: [&str; 11] = [
    CUSTOMER,
    VENDOR,
    ADMIN,
    JWT,
    AUTH_TOKEN,
    JWT_TOKEN,
    CUSTOMER_DATA,
    VENDOR_DATA,
    ADMIN_DATA,
    CART_UPDATE,
    WISHLIST_UPDATE,
];
