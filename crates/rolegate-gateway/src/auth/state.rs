//! Shared authentication state and the login flow.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rolegate_core::Config;

use super::AuthError;
use super::config::AuthConfig;
use super::jwt::{Claims, TokenIssuer, TokenValidator};
use super::middleware::Gate;
use super::password::verify_password;
use super::policy::AuthorizationPolicy;
use super::users::{CredentialStore, Credentials};

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    /// Signed bearer token.
    pub token: String,
    /// When the token stops being accepted.
    pub expires_at: DateTime<Utc>,
    /// Claims embedded in the token.
    pub claims: Claims,
}

/// Authentication state shared by all request handlers.
///
/// Immutable after construction.
#[derive(Debug)]
pub struct AuthState {
    users: CredentialStore,
    issuer: TokenIssuer,
    validator: TokenValidator,
    policy: AuthorizationPolicy,
}

impl AuthState {
    /// Initialize auth state.
    ///
    /// # Errors
    ///
    /// Returns error if the seed identities are invalid.
    pub fn initialize(config: AuthConfig) -> Result<Self, AuthError> {
        let users = CredentialStore::from_records(&config.identities, &config.hasher)?;

        tracing::info!(
            identities = users.len(),
            operations = config.policy.0.len(),
            ttl_secs = config.token_ttl.as_secs(),
            "Auth initialized"
        );

        Ok(Self {
            users,
            issuer: TokenIssuer::new(&config.secret, config.token_ttl),
            validator: TokenValidator::new(&config.secret),
            policy: AuthorizationPolicy::from_table(&config.policy),
        })
    }

    /// Initialize from the loaded configuration and the process environment.
    ///
    /// # Errors
    ///
    /// Returns error if no signing secret is configured or the identities
    /// are invalid.
    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        Self::initialize(AuthConfig::from_core(config)?)
    }

    /// Authenticate `credentials` and issue a token.
    ///
    /// The password is trimmed before verification. An unknown username is
    /// verified against a decoy hash so it takes as long as a wrong
    /// password, and both fail with the same error.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] on unknown username or wrong
    /// password.
    pub async fn login(&self, credentials: Credentials) -> Result<LoginGrant, AuthError> {
        let Credentials { username, password } = credentials;
        let password = password.trimmed();

        let identity = self.users.find_by_username(&username).cloned();
        let stored_hash = identity.as_ref().map_or_else(
            || self.users.decoy_hash().to_string(),
            |i| i.password_hash.clone(),
        );

        let verified =
            tokio::task::spawn_blocking(move || verify_password(password.expose(), &stored_hash))
                .await
                .map_err(|e| AuthError::Internal(format!("Password verification task failed: {e}")))?;

        let Some(identity) = identity.filter(|_| verified) else {
            tracing::debug!("Login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        let issued = self.issuer.issue(&identity)?;

        tracing::info!(
            username = %identity.username,
            role = %identity.role,
            "Login succeeded"
        );

        Ok(LoginGrant {
            token: issued.token,
            expires_at: issued.expires_at,
            claims: issued.claims,
        })
    }

    /// The request gate for protected operations.
    #[must_use]
    pub const fn gate(&self) -> Gate<'_> {
        Gate::new(&self.validator, &self.policy)
    }

    /// Get the credential store.
    #[must_use]
    pub const fn users(&self) -> &CredentialStore {
        &self.users
    }

    /// Get the permission policy.
    #[must_use]
    pub const fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }

    /// Get the token issuer.
    #[must_use]
    pub const fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Get the token validator.
    #[must_use]
    pub const fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    /// Token lifetime.
    #[must_use]
    pub const fn token_ttl(&self) -> Duration {
        self.issuer.ttl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::{Password, PasswordHasher};
    use rolegate_core::{IdentityRecord, PolicyTable, Role, SigningSecret};

    const SECRET: &str = "test-signing-secret-with-32-plus-bytes";

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(1024, 1, 1).unwrap()
    }

    fn record(id: u64, username: &str, password: &str, role: Role) -> IdentityRecord {
        IdentityRecord {
            id,
            username: username.to_string(),
            password_hash: hasher().hash(password).unwrap(),
            role,
        }
    }

    fn state() -> AuthState {
        let config = AuthConfig::builder(SigningSecret::new(SECRET.to_string()).unwrap())
            .identities([
                record(1, "admin", "admin123", Role::Admin),
                record(2, "mod", "mod123", Role::Moderator),
                record(3, "user", "user123", Role::User),
            ])
            .policy(PolicyTable::default())
            .hasher(hasher())
            .build();
        AuthState::initialize(config).unwrap()
    }

    fn credentials(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: Password::new(password),
        }
    }

    #[tokio::test]
    async fn test_login_success() {
        let state = state();
        let grant = state.login(credentials("mod", "mod123")).await.unwrap();

        assert_eq!(grant.claims.id, 2);
        assert_eq!(grant.claims.username, "mod");
        assert_eq!(grant.claims.role, Role::Moderator);

        let claims = state.validator().validate(&grant.token).unwrap();
        assert_eq!(claims, grant.claims);
        assert_eq!(grant.expires_at.timestamp(), claims.exp);
    }

    #[tokio::test]
    async fn test_login_trims_password() {
        let state = state();
        assert!(state.login(credentials("user", "  user123\n")).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_match() {
        let state = state();

        let wrong = state.login(credentials("admin", "nope")).await.unwrap_err();
        let unknown = state.login(credentials("ghost", "admin123")).await.unwrap_err();

        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_empty_credentials_rejected() {
        let state = state();
        let err = state.login(Credentials::default()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_username_is_case_sensitive() {
        let state = state();
        let err = state.login(credentials("Admin", "admin123")).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn test_accessors() {
        let state = state();
        assert_eq!(state.users().len(), 3);
        assert_eq!(state.token_ttl(), Duration::from_secs(3600));
        assert!(state.policy().is_allowed(Role::User, "profile"));
        assert!(state.issuer().ttl() > Duration::ZERO);
    }
}
