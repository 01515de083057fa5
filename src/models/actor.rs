use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Marketplace role of the caller.
///
/// `System` is reserved for transitions the workflow performs on its own
/// (closing bidding, recording captures) and is never accepted from a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Shopper,
    Shipper,
    Admin,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Shopper => "shopper",
            Role::Shipper => "shipper",
            Role::Admin => "admin",
            Role::System => "system",
        }
    }

    /// Parse a client-supplied role. `system` is deliberately not parseable.
    pub fn from_client_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "shopper" => Some(Role::Shopper),
            "shipper" => Some(Role::Shipper),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and role of whoever is invoking an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn shopper(id: Uuid) -> Self {
        Self::new(id, Role::Shopper)
    }

    pub fn shipper(id: Uuid) -> Self {
        Self::new(id, Role::Shipper)
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn system() -> Self {
        Self::new(Uuid::nil(), Role::System)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_role_is_not_client_parseable() {
        assert_eq!(Role::from_client_str("Admin"), Some(Role::Admin));
        assert_eq!(Role::from_client_str(" shipper "), Some(Role::Shipper));
        assert_eq!(Role::from_client_str("system"), None);
        assert_eq!(Role::from_client_str(""), None);
    }
}
