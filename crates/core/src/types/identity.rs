//! Identity records for the three marketplace roles.
//!
//! Exactly one of customer / vendor / admin may be logged in at a time.
//! The session store does not enforce that invariant itself; it is a caller
//! discipline the coordinator and the store's setters rely on.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::types::credential::IdentityHint;
use crate::types::email::Email;
use crate::types::id::{AdminId, CustomerId, VendorId};
use crate::types::storage_keys;

/// The three mutually-exclusive login roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Vendor,
    Admin,
}

impl Role {
    /// All roles in slot-precedence order (customer first, admin last).
    ///
    /// This is the fixed order `load_from_persistent_store` probes keys in.
    pub const ALL: [Self; 3] = [Self::Customer, Self::Vendor, Self::Admin];

    /// Persistent-store key holding this role's serialized identity record.
    #[must_use]
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::Customer => storage_keys::CUSTOMER,
            Self::Vendor => storage_keys::VENDOR,
            Self::Admin => storage_keys::ADMIN,
        }
    }

    /// Legacy per-role key that may hold a serialized credential blob.
    #[must_use]
    pub const fn data_key(self) -> &'static str {
        match self {
            Self::Customer => storage_keys::CUSTOMER_DATA,
            Self::Vendor => storage_keys::VENDOR_DATA,
            Self::Admin => storage_keys::ADMIN_DATA,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Vendor => write!(f, "vendor"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// Error parsing a [`Role`] from a string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct RoleParseError(String);

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "vendor" => Ok(Self::Vendor),
            "admin" => Ok(Self::Admin),
            other => Err(RoleParseError(other.to_owned())),
        }
    }
}

/// Profile for a logged-in customer.
///
/// Carries the embedded cart and wishlist product-id lists the session store
/// derives its counts from and patches on cross-tab updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    /// Customer's database ID.
    pub id: CustomerId,
    /// Customer's email address.
    pub email: Email,
    /// Display name shown in the account menu.
    pub display_name: String,
    /// Product IDs currently in the cart.
    #[serde(default)]
    pub cart_item_ids: Vec<String>,
    /// Product IDs currently on the wishlist.
    #[serde(default)]
    pub wishlist_item_ids: Vec<String>,
}

/// Profile for a logged-in vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorProfile {
    /// Vendor's database ID.
    pub id: VendorId,
    /// Vendor's email address.
    pub email: Email,
    /// Shop name shown on listings.
    pub shop_name: String,
}

/// Profile for a logged-in administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminProfile {
    /// Admin's database ID.
    pub id: AdminId,
    /// Admin's email address.
    pub email: Email,
    /// Display name.
    pub display_name: String,
}

/// The serialized profile for exactly one of customer / vendor / admin.
///
/// A tagged union so that role dispatch is exhaustive at compile time
/// instead of probing optional fields at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum IdentityRecord {
    Customer(CustomerProfile),
    Vendor(VendorProfile),
    Admin(AdminProfile),
}

impl IdentityRecord {
    /// The role this record belongs to.
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::Customer(_) => Role::Customer,
            Self::Vendor(_) => Role::Vendor,
            Self::Admin(_) => Role::Admin,
        }
    }

    /// The email address used to re-authenticate this identity.
    #[must_use]
    pub const fn email(&self) -> &Email {
        match self {
            Self::Customer(p) => &p.email,
            Self::Vendor(p) => &p.email,
            Self::Admin(p) => &p.email,
        }
    }

    /// Name shown in account-related UI.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::Customer(p) => &p.display_name,
            Self::Vendor(p) => &p.shop_name,
            Self::Admin(p) => &p.display_name,
        }
    }

    /// The `{email, role}` pair the re-authentication prompt is seeded with.
    #[must_use]
    pub fn hint(&self) -> IdentityHint {
        IdentityHint {
            email: self.email().clone(),
            role: self.role(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn customer() -> IdentityRecord {
        IdentityRecord::Customer(CustomerProfile {
            id: CustomerId::generate(),
            email: Email::parse("a@b.com").unwrap(),
            display_name: "Amira".to_owned(),
            cart_item_ids: vec!["p-1".to_owned()],
            wishlist_item_ids: vec![],
        })
    }

    #[test]
    fn test_role_round_trips_through_str() {
        for role in Role::ALL {
            let parsed: Role = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_record_is_role_tagged_json() {
        let json = serde_json::to_value(customer()).unwrap();
        assert_eq!(json["role"], "customer");
        assert_eq!(json["cart_item_ids"][0], "p-1");
    }

    #[test]
    fn test_missing_id_lists_default_to_empty() {
        // Records written before the cart/wishlist embedding still parse.
        let json = serde_json::json!({
            "role": "customer",
            "id": uuid::Uuid::new_v4(),
            "email": "a@b.com",
            "display_name": "Amira",
        });
        let record: IdentityRecord = serde_json::from_value(json).unwrap();
        let IdentityRecord::Customer(profile) = record else {
            panic!("expected customer record");
        };
        assert!(profile.cart_item_ids.is_empty());
        assert!(profile.wishlist_item_ids.is_empty());
    }

    #[test]
    fn test_hint_carries_email_and_role() {
        let hint = customer().hint();
        assert_eq!(hint.email.as_str(), "a@b.com");
        assert_eq!(hint.role, Role::Customer);
    }
}
