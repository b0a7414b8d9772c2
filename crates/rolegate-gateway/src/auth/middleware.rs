//! Request gate for protected operations.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use rolegate_core::Role;

use super::AuthError;
use super::jwt::{Claims, TokenValidator, extract_bearer};
use super::policy::AuthorizationPolicy;
use super::state::AuthState;

/// An authenticated and authorized request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Claims from the validated token.
    pub claims: Claims,
    /// Operation the caller was allowed to perform.
    pub operation: String,
}

impl AuthContext {
    /// Get the identity ID.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.claims.id
    }

    /// Get the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.claims.username
    }

    /// Get the role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.claims.role
    }
}

/// Decides whether a request may perform an operation.
///
/// Checks run in order: a bearer token must be present, it must validate,
/// and its role must be allowed the operation. The first failure wins.
#[derive(Debug, Clone, Copy)]
pub struct Gate<'a> {
    validator: &'a TokenValidator,
    policy: &'a AuthorizationPolicy,
}

impl<'a> Gate<'a> {
    /// Create a gate over a validator and policy.
    #[must_use]
    pub const fn new(validator: &'a TokenValidator, policy: &'a AuthorizationPolicy) -> Self {
        Self { validator, policy }
    }

    /// Evaluate a request's `Authorization` header value for `operation`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingToken`] if there is no bearer token
    /// - [`AuthError::Token`] if the token is rejected
    /// - [`AuthError::Forbidden`] if the role lacks permission
    pub fn evaluate(
        &self,
        authorization: Option<&str>,
        operation: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthContext, AuthError> {
        let token = authorization
            .and_then(extract_bearer)
            .ok_or(AuthError::MissingToken)?;

        let claims = self.validator.validate_at(token, now).map_err(|reason| {
            tracing::debug!(%reason, operation, "Token rejected");
            AuthError::Token(reason)
        })?;

        if let Err(err) = self.policy.check(claims.role, operation) {
            tracing::info!(
                username = %claims.username,
                role = %claims.role,
                operation,
                "Permission denied"
            );
            return Err(err);
        }

        Ok(AuthContext {
            claims,
            operation: operation.to_string(),
        })
    }
}

/// Middleware guarding `/api/{operation}`.
///
/// On success the [`AuthContext`] is stored in the request extensions for
/// the [`Authenticated`] extractor.
pub async fn require_permission(
    State(auth): State<Arc<AuthState>>,
    Path(operation): Path<String>,
    mut request: Request,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth.gate().evaluate(authorization, &operation, Utc::now()) {
        Ok(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Extractor for requests that passed [`require_permission`].
///
/// Rejects with "No token provided" if the route is not behind the gate.
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthContext);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(Self)
            .ok_or(AuthError::MissingToken)
    }
}
