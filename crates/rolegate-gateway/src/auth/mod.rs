//! Authentication and authorization for the gateway.
//!
//! This module provides:
//! - An in-memory credential store seeded from configuration
//! - Argon2 password hashing and verification
//! - JWT issuance and validation
//! - A static role-based permission policy
//! - The request gate middleware for protected routes

mod config;
mod jwt;
mod middleware;
mod password;
mod policy;
/// Bootstrap admin provisioning from the environment.
pub mod setup;
mod state;
mod users;

pub use config::{AuthConfig, AuthConfigBuilder};
pub use jwt::{Claims, IssuedToken, TokenIssuer, TokenValidator, extract_bearer, peek_claims};
pub use middleware::{AuthContext, Authenticated, Gate, require_permission};
pub use password::{Password, PasswordHasher, verify_password};
pub use policy::AuthorizationPolicy;
pub use state::{AuthState, LoginGrant};
pub use users::{CredentialStore, Credentials, Identity};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rolegate_core::Role;
use serde::Serialize;
use thiserror::Error;

/// Why a presented token was not accepted.
///
/// Every variant is reported to clients as "Token is invalid"; the
/// distinction is kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenRejection {
    /// Not a parseable three-part token.
    #[error("malformed token")]
    Malformed,
    /// Signature does not match the payload.
    #[error("invalid signature")]
    InvalidSignature,
    /// Signature is valid but the token is past its expiry.
    #[error("token expired")]
    Expired,
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Request body could not be parsed.
    #[error("Invalid request body: {0}")]
    MalformedInput(String),

    /// Unknown username or wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// No usable bearer token on the request.
    #[error("No token provided")]
    MissingToken,

    /// Bearer token was rejected.
    #[error("Token is invalid: {0}")]
    Token(#[from] TokenRejection),

    /// Valid identity without permission for the operation.
    #[error("Forbidden: {role} may not access '{operation}'")]
    Forbidden {
        /// Role carried by the token.
        role: Role,
        /// Operation that was requested.
        operation: String,
    },

    /// Too many login attempts from one client.
    #[error("Too many login attempts")]
    RateLimited,

    /// Password hashing failed.
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MalformedInput(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::MissingToken => StatusCode::UNAUTHORIZED,
            Self::Token(_) | Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Hashing(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "malformed_input",
            Self::InvalidCredentials => "invalid_credentials",
            Self::MissingToken => "missing_token",
            Self::Token(_) => "invalid_token",
            Self::Forbidden { .. } => "forbidden",
            Self::RateLimited => "rate_limited",
            Self::Hashing(_) | Self::Config(_) | Self::Internal(_) => "internal_error",
        }
    }

    /// Message shown to clients.
    ///
    /// Never includes internal detail: token rejection reasons collapse to
    /// one message and server-side failures are not described.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "Invalid request body",
            Self::InvalidCredentials => "Invalid credentials",
            Self::MissingToken => "No token provided",
            Self::Token(_) => "Token is invalid",
            Self::Forbidden { .. } => "Forbidden: you do not have permission",
            Self::RateLimited => "Too many login attempts",
            Self::Hashing(_) | Self::Config(_) | Self::Internal(_) => "Internal server error",
        }
    }
}

/// Error response for auth failures.
#[derive(Debug, Serialize)]
struct AuthErrorResponse {
    message: &'static str,
    code: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::error!(error = %self, "Auth request failed");
        }

        let body = AuthErrorResponse {
            message: self.public_message(),
            code: self.code(),
        };

        (self.status(), Json(body)).into_response()
    }
}
