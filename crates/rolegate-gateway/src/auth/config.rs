//! Authentication configuration.

use std::time::Duration;

use rolegate_core::{Config, IdentityRecord, PolicyTable, SigningSecret};

use super::AuthError;
use super::password::PasswordHasher;
use super::setup;

/// Default token lifetime.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Everything needed to build an [`AuthState`](super::AuthState).
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Token signing secret.
    pub secret: SigningSecret,
    /// Token lifetime.
    pub token_ttl: Duration,
    /// Identities to seed into the credential store.
    pub identities: Vec<IdentityRecord>,
    /// Operation to allowed-roles table.
    pub policy: PolicyTable,
    /// Hasher used for the bootstrap admin and the decoy hash.
    pub hasher: PasswordHasher,
}

impl AuthConfig {
    /// Create a new auth config builder.
    #[must_use]
    pub fn builder(secret: SigningSecret) -> AuthConfigBuilder {
        AuthConfigBuilder {
            config: Self {
                secret,
                token_ttl: DEFAULT_TOKEN_TTL,
                identities: Vec::new(),
                policy: PolicyTable::default(),
                hasher: PasswordHasher::default(),
            },
        }
    }

    /// Build from the loaded configuration and the process environment.
    ///
    /// Secret and port overrides (`ROLEGATE_JWT_SECRET`,
    /// `ROLEGATE_JWT_SECRET_FILE`, `ROLEGATE_PORT`) and the bootstrap admin
    /// variables are all read from the environment.
    ///
    /// # Errors
    ///
    /// Returns error if no signing secret is configured or the bootstrap
    /// admin cannot be provisioned.
    pub fn from_core(config: &Config) -> Result<Self, AuthError> {
        Self::from_core_with(config, |key| std::env::var(key).ok())
    }

    /// Build from the loaded configuration, reading overrides and bootstrap
    /// admin variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns error if an override is invalid, no signing secret is
    /// configured, or the bootstrap admin cannot be provisioned.
    pub fn from_core_with<F>(config: &Config, lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = config
            .clone()
            .with_overrides_from(&lookup)
            .map_err(|e| AuthError::Config(e.to_string()))?;

        let secret = config
            .auth
            .signing_secret()
            .map_err(|e| AuthError::Config(e.to_string()))?;

        let hasher = PasswordHasher::default();
        let mut identities = config.identities.clone();
        setup::bootstrap_admin_from(&mut identities, &hasher, lookup)?;

        if identities.is_empty() {
            tracing::warn!("No identities configured; every login will fail");
        }

        Ok(Self {
            secret,
            token_ttl: Duration::from_secs(config.auth.token_ttl_secs),
            identities,
            policy: config.policy.clone(),
            hasher,
        })
    }
}

/// Builder for `AuthConfig`.
#[derive(Debug)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    /// Set the token lifetime.
    #[must_use]
    pub const fn token_ttl(mut self, ttl: Duration) -> Self {
        self.config.token_ttl = ttl;
        self
    }

    /// Add one identity.
    #[must_use]
    pub fn identity(mut self, record: IdentityRecord) -> Self {
        self.config.identities.push(record);
        self
    }

    /// Add several identities.
    #[must_use]
    pub fn identities(mut self, records: impl IntoIterator<Item = IdentityRecord>) -> Self {
        self.config.identities.extend(records);
        self
    }

    /// Replace the permission table.
    #[must_use]
    pub fn policy(mut self, policy: PolicyTable) -> Self {
        self.config.policy = policy;
        self
    }

    /// Set the password hasher.
    #[must_use]
    pub fn hasher(mut self, hasher: PasswordHasher) -> Self {
        self.config.hasher = hasher;
        self
    }

    /// Build the config.
    #[must_use]
    pub fn build(self) -> AuthConfig {
        self.config
    }
}
