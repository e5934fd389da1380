use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Member identity as returned by the identity resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub display_name: String,
    pub role: String,
    pub is_admin: bool,
}

impl Identity {
    pub fn member(display_name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            role: role.into(),
            is_admin: false,
        }
    }

    pub fn admin(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            role: "Admin".to_string(),
            is_admin: true,
        }
    }
}

/// The party attempting a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub identity: String,
    pub is_admin: bool,
}

impl From<&Identity> for Actor {
    fn from(identity: &Identity) -> Self {
        Self {
            identity: identity.display_name.clone(),
            is_admin: identity.is_admin,
        }
    }
}

/// What a caller presents: a phone-like member id plus the household's
/// shared access code.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub phone: String,
    pub access_code: String,
}

impl Credential {
    pub fn new(phone: impl Into<String>, access_code: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            access_code: access_code.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("phone", &self.phone)
            .field("access_code", &"[REDACTED]")
            .finish()
    }
}
