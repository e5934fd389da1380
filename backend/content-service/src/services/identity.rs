/// Identity resolution
///
/// Turns a member credential into the identity the authorizer acts on.
/// Nothing the client sends about itself is trusted: the display name,
/// role and admin flag are looked up on every call.
use crate::db::member_repo;
use async_trait::async_trait;
use content_model::{Credential, Identity};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("credential not recognised")]
    Unauthenticated,

    #[error("identity lookup unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for IdentityError {
    fn from(err: sqlx::Error) -> Self {
        IdentityError::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, credential: &Credential) -> Result<Identity, IdentityError>;
}

/// SHA-256 digest of the shared household access code.
#[derive(Clone)]
pub struct AccessCode {
    digest: [u8; 32],
}

impl AccessCode {
    /// Parse a hex-encoded SHA-256 digest.
    pub fn from_sha256_hex(hex_digest: &str) -> Result<Self, String> {
        let bytes = hex::decode(hex_digest.trim())
            .map_err(|e| format!("access code digest is not hex: {}", e))?;
        let digest: [u8; 32] = bytes
            .try_into()
            .map_err(|_| "access code digest must be 32 bytes".to_string())?;
        Ok(Self { digest })
    }

    pub fn from_plain(code: &str) -> Self {
        Self {
            digest: Sha256::digest(code.as_bytes()).into(),
        }
    }

    pub fn matches(&self, presented: &str) -> bool {
        let presented: [u8; 32] = Sha256::digest(presented.as_bytes()).into();
        constant_time_compare(&self.digest, &presented)
    }
}

impl std::fmt::Debug for AccessCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessCode([REDACTED])")
    }
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

/// Digits only, so "555-0100" and "(555) 0100" name the same member.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// Household members table plus the shared access code.
pub struct PgIdentityResolver {
    pool: PgPool,
    access_code: AccessCode,
}

impl PgIdentityResolver {
    pub fn new(pool: PgPool, access_code: AccessCode) -> Self {
        Self { pool, access_code }
    }
}

#[async_trait]
impl IdentityResolver for PgIdentityResolver {
    async fn resolve(&self, credential: &Credential) -> Result<Identity, IdentityError> {
        if !self.access_code.matches(&credential.access_code) {
            return Err(IdentityError::Unauthenticated);
        }

        let phone = normalize_phone(&credential.phone);
        let member = member_repo::find_by_phone(&self.pool, &phone)
            .await?
            .ok_or(IdentityError::Unauthenticated)?;

        Ok(Identity {
            display_name: member.display_name().to_string(),
            role: member.role.clone(),
            is_admin: member.is_admin,
        })
    }
}

/// Fixed phone → identity table.
#[derive(Debug, Clone)]
pub struct StaticIdentityResolver {
    access_code: AccessCode,
    members: HashMap<String, Identity>,
}

impl StaticIdentityResolver {
    pub fn new(access_code: AccessCode) -> Self {
        Self {
            access_code,
            members: HashMap::new(),
        }
    }

    pub fn with_member(mut self, phone: &str, identity: Identity) -> Self {
        self.members.insert(normalize_phone(phone), identity);
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, credential: &Credential) -> Result<Identity, IdentityError> {
        if !self.access_code.matches(&credential.access_code) {
            return Err(IdentityError::Unauthenticated);
        }
        self.members
            .get(&normalize_phone(&credential.phone))
            .cloned()
            .ok_or(IdentityError::Unauthenticated)
    }
}
