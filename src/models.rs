//! Request and response models for the API.
//!
//! All models use serde for serialization/deserialization.
//! Storage models represent records held in the expiring store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Auth Models
// ============================================================================

/// Response containing a nonce to embed in the sign-in message.
#[derive(Debug, Serialize)]
pub struct NonceResponse {
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}

/// Request carrying a signed sign-in message.
#[derive(Debug, Deserialize)]
pub struct SiweRequest {
    pub message: String,
    pub signature: String, // hex, optional 0x prefix
}

/// Public view of a user.
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub wallet_address: String,
    pub role: Role,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            wallet_address: user.wallet_address.clone(),
            role: user.role,
        }
    }
}

/// Response after successful sign-in.
#[derive(Debug, Serialize)]
pub struct SiweResponse {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserInfo,
}

/// Response for the current-session endpoint.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: String,
    pub wallet_address: String,
}

// ============================================================================
// Storage Models
// ============================================================================

/// Single-use nonce as stored under `nonce:{value}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce {
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Nonce {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Authenticated session as stored under `session:{id}`.
///
/// Expiry is fixed at creation and never extended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub wallet_address: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// User as held by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub wallet_address: String, // lower case
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// User Roles
// ============================================================================

/// User role types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Seller,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Seller => "seller",
            Role::Admin => "admin",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_role_as_str_matches_serde() {
        for role in [Role::Customer, Role::Seller, Role::Admin] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
        assert_eq!(Role::default(), Role::Customer);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Seller).unwrap();
        assert_eq!(json, "\"seller\"");
    }

    #[test]
    fn test_session_expiry_boundary() {
        let now = Utc::now();
        let session = Session {
            id: "s".to_string(),
            user_id: "u".to_string(),
            wallet_address: "0xabc".to_string(),
            created_at: now - Duration::hours(24),
            expires_at: now,
        };
        assert!(session.is_expired_at(now));
        assert!(!session.is_expired_at(now - Duration::seconds(1)));
    }
}
