//! Capability tokens
//!
//! An [`AccessToken`] is an opaque secret bound to a set of [`Capability`]
//! values. The registry keeps only blake3 digests of issued tokens, so a
//! leaked registry dump cannot be replayed as a credential.

use std::collections::BTreeSet;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::AuthError;

/// Privileged operation classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Submit verified offset credentials (the credential oracle)
    CredentialIntake,
    /// Change configuration, move reserves, manage tokens
    Admin,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::CredentialIntake => write!(f, "credential_intake"),
            Capability::Admin => write!(f, "admin"),
        }
    }
}

/// Opaque bearer secret
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a secret received from a transport layer
    pub fn from_secret(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    fn digest(&self) -> String {
        hex::encode(blake3::hash(self.0.as_bytes()).as_bytes())
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// What an issued token may do
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grant {
    /// Human-readable holder label (e.g. "registry-oracle-eu")
    pub label: String,
    pub capabilities: BTreeSet<Capability>,
    /// Unix milliseconds
    pub issued_at: i64,
}

/// Registry of issued capability tokens
#[derive(Debug, Default)]
pub struct AuthorityRegistry {
    grants: DashMap<String, Grant>,
}

impl AuthorityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token carrying `capabilities`
    pub fn issue(&self, label: impl Into<String>, capabilities: &[Capability]) -> AccessToken {
        let token = AccessToken(format!("vdt_{}", uuid::Uuid::new_v4().simple()));
        let grant = Grant {
            label: label.into(),
            capabilities: capabilities.iter().copied().collect(),
            issued_at: chrono::Utc::now().timestamp_millis(),
        };
        info!(label = %grant.label, capabilities = ?grant.capabilities, "Issued access token");
        self.grants.insert(token.digest(), grant);
        token
    }

    /// Revoke a token; returns whether it existed
    pub fn revoke(&self, token: &AccessToken) -> bool {
        let removed = self.grants.remove(&token.digest());
        if let Some((_, grant)) = &removed {
            info!(label = %grant.label, "Revoked access token");
        }
        removed.is_some()
    }

    /// Check that `token` carries `capability`
    pub fn authorize(&self, token: &AccessToken, capability: Capability) -> Result<(), AuthError> {
        let Some(grant) = self.grants.get(&token.digest()) else {
            warn!(%capability, "Rejected unknown access token");
            return Err(AuthError::UnknownToken);
        };

        if !grant.capabilities.contains(&capability) {
            warn!(label = %grant.label, %capability, "Access token lacks capability");
            return Err(AuthError::Unauthorized {
                capability: capability.to_string(),
            });
        }

        debug!(label = %grant.label, %capability, "Authorized");
        Ok(())
    }

    /// Grant metadata for a token
    pub fn grant(&self, token: &AccessToken) -> Option<Grant> {
        self.grants.get(&token.digest()).map(|g| g.clone())
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}
