/// Shared types used across the codebase

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Principal roles, ordered from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }

    pub fn is_guide(&self) -> bool {
        matches!(self, Role::Guide | Role::LeadGuide)
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "user" => Ok(Role::User),
            "guide" => Ok(Role::Guide),
            "lead-guide" => Ok(Role::LeadGuide),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Document identifier: 24 hexadecimal characters (12 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub const LEN: usize = 24;

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Accepts exactly 24 hex digits of either case; stored lowercased
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() == Self::LEN && value.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(value.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_valid() {
        let id = ObjectId::generate();
        assert_eq!(id.as_str().len(), ObjectId::LEN);
        assert!(ObjectId::parse(id.as_str()).is_some());
        assert_ne!(id, ObjectId::generate());
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        assert!(ObjectId::parse("xyz").is_none());
        assert!(ObjectId::parse("5c88fa8cf4afda39709c295").is_none());
        assert!(ObjectId::parse("5c88fa8cf4afda39709c295g").is_none());
        assert_eq!(
            ObjectId::parse("5C88FA8CF4AFDA39709C295A").map(ObjectId::into_string),
            Some("5c88fa8cf4afda39709c295a".to_string())
        );
    }

    #[test]
    fn roles_round_trip_through_text() {
        for role in [Role::User, Role::Guide, Role::LeadGuide, Role::Admin] {
            assert_eq!(Role::try_from(role.as_str().to_string()), Ok(role));
        }
        assert!(Role::try_from("root".to_string()).is_err());
        assert_eq!(serde_json::to_value(Role::LeadGuide).unwrap(), "lead-guide");
    }
}
