//! # Rolegate Gateway
//!
//! HTTP gateway issuing bearer tokens and enforcing role-based access.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and authorization.
pub mod auth;
mod middleware;
mod server;

pub use auth::{AuthConfig, AuthError, AuthState, AuthorizationPolicy, Claims, CredentialStore};
pub use middleware::GatewayRateLimiter;
pub use server::{Gateway, GatewayConfig, GatewayState};

/// Start the gateway server from a loaded configuration.
///
/// Environment overrides are applied on top of `config` before anything is
/// built.
///
/// # Errors
///
/// Returns error if an override is invalid, auth cannot be initialized, or
/// the server fails to start.
pub async fn start(config: &rolegate_core::Config) -> Result<(), GatewayError> {
    let config = config
        .clone()
        .with_env_overrides()
        .map_err(|e| GatewayError::Config(e.to_string()))?;
    let auth = std::sync::Arc::new(AuthState::from_config(&config)?);
    let gateway = Gateway::new(GatewayConfig::from_core(&config.gateway), auth);
    gateway.run().await
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Auth initialization error.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}
