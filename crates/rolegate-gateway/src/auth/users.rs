//! Identity model and in-memory credential store.

use std::collections::{HashMap, HashSet};

use rand::{Rng, distributions::Alphanumeric};
use rolegate_core::{IdentityRecord, Role};
use serde::Deserialize;

use super::AuthError;
use super::password::{Password, PasswordHasher, is_valid_hash};

/// A registered identity.
#[derive(Clone)]
pub struct Identity {
    /// Opaque numeric ID.
    pub id: u64,
    /// Unique login name.
    pub username: String,
    /// PHC password hash (never exposed in responses or logs).
    pub password_hash: String,
    /// Assigned role.
    pub role: Role,
}

impl From<&IdentityRecord> for Identity {
    fn from(record: &IdentityRecord) -> Self {
        Self {
            id: record.id,
            username: record.username.clone(),
            password_hash: record.password_hash.clone(),
            role: record.role,
        }
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Login request body.
///
/// Missing fields deserialize as empty strings so they fail as bad
/// credentials rather than as malformed input.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    /// Login name.
    #[serde(default)]
    pub username: String,
    /// Plaintext password.
    #[serde(default)]
    pub password: Password,
}

/// Read-only directory of identities, keyed by username.
///
/// Built once at start-up and shared without locking.
pub struct CredentialStore {
    by_username: HashMap<String, Identity>,
    decoy_hash: String,
}

impl CredentialStore {
    /// Build the store from seed records.
    ///
    /// Also hashes a random decoy password with `hasher`, used to keep the
    /// unknown-username path as slow as a password mismatch.
    ///
    /// # Errors
    ///
    /// Returns error on duplicate usernames or ids, or on a stored hash that
    /// is not a PHC string.
    pub fn from_records(
        records: &[IdentityRecord],
        hasher: &PasswordHasher,
    ) -> Result<Self, AuthError> {
        let mut by_username = HashMap::with_capacity(records.len());
        let mut ids = HashSet::with_capacity(records.len());

        for record in records {
            if !is_valid_hash(&record.password_hash) {
                return Err(AuthError::Config(format!(
                    "Identity '{}' has an invalid password hash",
                    record.username
                )));
            }
            if !ids.insert(record.id) {
                return Err(AuthError::Config(format!(
                    "Duplicate identity id {}",
                    record.id
                )));
            }
            if by_username
                .insert(record.username.clone(), Identity::from(record))
                .is_some()
            {
                return Err(AuthError::Config(format!(
                    "Duplicate username '{}'",
                    record.username
                )));
            }
        }

        let decoy_password: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let decoy_hash = hasher.hash(&decoy_password)?;

        Ok(Self {
            by_username,
            decoy_hash,
        })
    }

    /// Look up an identity by username.
    #[must_use]
    pub fn find_by_username(&self, username: &str) -> Option<&Identity> {
        self.by_username.get(username)
    }

    /// Number of identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_username.len()
    }

    /// Whether the store has no identities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_username.is_empty()
    }

    /// Hash verified when the username is unknown.
    pub(crate) fn decoy_hash(&self) -> &str {
        &self.decoy_hash
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("identities", &self.by_username.len())
            .finish_non_exhaustive()
    }
}
