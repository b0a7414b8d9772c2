//! Signed access tokens.
//!
//! Tokens are HS256 JWTs carrying the identity's id, username and role.
//! Expiry is checked against an explicit clock reading so validation is
//! deterministic under test.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::{Error as JwtError, ErrorKind},
};
use rolegate_core::{Role, SigningSecret};
use serde::{Deserialize, Serialize};

use super::users::Identity;
use super::{AuthError, TokenRejection};

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity ID.
    pub id: u64,
    /// Username.
    pub username: String,
    /// Role at issue time.
    pub role: Role,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// A freshly issued token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact serialized token.
    pub token: String,
    /// Claims embedded in the token.
    pub claims: Claims,
    /// Expiration instant.
    pub expires_at: DateTime<Utc>,
}

/// Creates signed tokens for authenticated identities.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    /// Create an issuer that signs with `secret`.
    #[must_use]
    pub fn new(secret: &SigningSecret, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.expose()),
            ttl,
        }
    }

    /// Token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `identity`, valid from now.
    ///
    /// # Errors
    ///
    /// Returns error if token encoding fails.
    pub fn issue(&self, identity: &Identity) -> Result<IssuedToken, AuthError> {
        self.issue_at(identity, Utc::now())
    }

    /// Issue a token for `identity` as of `now`.
    ///
    /// # Errors
    ///
    /// Returns error if the lifetime is out of range or encoding fails.
    pub fn issue_at(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| AuthError::Internal(format!("Token lifetime out of range: {e}")))?;
        let expires_at = now + ttl;

        let claims = Claims {
            id: identity.id,
            username: identity.username.clone(),
            role: identity.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Token encoding failed: {e}")))?;

        Ok(IssuedToken {
            token,
            claims,
            expires_at,
        })
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Verifies token signatures and expiry.
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    /// Create a validator that checks signatures made with `secret`.
    #[must_use]
    pub fn new(secret: &SigningSecret) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is compared against the caller's clock in `validate_at`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            decoding_key: DecodingKey::from_secret(secret.expose()),
            validation,
        }
    }

    /// Validate a token against the current time.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason if the token is not accepted.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenRejection> {
        self.validate_at(token, Utc::now())
    }

    /// Validate a token as of `now`.
    ///
    /// The signature is checked before expiry, so a forged token is never
    /// reported as merely expired. A token is expired from the second its
    /// `exp` is reached.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason if the token is not accepted.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenRejection> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| rejection(&e))?;

        if now.timestamp() >= data.claims.exp {
            return Err(TokenRejection::Expired);
        }

        Ok(data.claims)
    }
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator").finish_non_exhaustive()
    }
}

fn rejection(err: &JwtError) -> TokenRejection {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
            TokenRejection::InvalidSignature
        }
        ErrorKind::ExpiredSignature => TokenRejection::Expired,
        _ => TokenRejection::Malformed,
    }
}

/// Extract the token from an `Authorization` header value.
///
/// Expects format: "Bearer <token>"
#[must_use]
pub fn extract_bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Decode claims without checking the signature or expiry.
///
/// For diagnostics only. Never use the result to make access decisions.
///
/// # Errors
///
/// Returns [`TokenRejection::Malformed`] if the token cannot be decoded.
pub fn peek_claims(token: &str) -> Result<Claims, TokenRejection> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|_| TokenRejection::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "test-signing-secret-with-32-plus-bytes";
    const TTL: Duration = Duration::from_secs(3600);

    fn secret(value: &str) -> SigningSecret {
        SigningSecret::new(value.to_string()).unwrap()
    }

    fn identity() -> Identity {
        Identity {
            id: 2,
            username: "mod".to_string(),
            password_hash: String::new(),
            role: Role::Moderator,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_issue_and_validate() {
        let issuer = TokenIssuer::new(&secret(SECRET), TTL);
        let validator = TokenValidator::new(&secret(SECRET));

        let issued = issuer.issue_at(&identity(), t0()).unwrap();
        assert_eq!(issued.token.split('.').count(), 3);
        assert_eq!(issued.expires_at, t0() + chrono::Duration::hours(1));

        let claims = validator.validate_at(&issued.token, t0()).unwrap();
        assert_eq!(claims.id, 2);
        assert_eq!(claims.username, "mod");
        assert_eq!(claims.role, Role::Moderator);
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims, issued.claims);
    }

    #[test]
    fn test_issue_uses_current_time() {
        let issuer = TokenIssuer::new(&secret(SECRET), TTL);
        let validator = TokenValidator::new(&secret(SECRET));

        let issued = issuer.issue(&identity()).unwrap();
        assert!(issued.expires_at > Utc::now());
        assert!(validator.validate(&issued.token).is_ok());
    }

    #[test]
    fn test_expiry_boundary() {
        let issuer = TokenIssuer::new(&secret(SECRET), TTL);
        let validator = TokenValidator::new(&secret(SECRET));
        let issued = issuer.issue_at(&identity(), t0()).unwrap();

        let just_before = t0() + chrono::Duration::seconds(3599);
        assert!(validator.validate_at(&issued.token, just_before).is_ok());

        let at_expiry = t0() + chrono::Duration::seconds(3600);
        assert_eq!(
            validator.validate_at(&issued.token, at_expiry),
            Err(TokenRejection::Expired)
        );
    }

    #[test]
    fn test_wrong_secret() {
        let issuer = TokenIssuer::new(&secret(SECRET), TTL);
        let validator = TokenValidator::new(&secret("another-signing-secret-of-32-bytes-or-more"));
        let issued = issuer.issue_at(&identity(), t0()).unwrap();

        assert_eq!(
            validator.validate_at(&issued.token, t0()),
            Err(TokenRejection::InvalidSignature)
        );

        // Forgery is reported as such even once the token would have expired.
        let later = t0() + chrono::Duration::days(1);
        assert_eq!(
            validator.validate_at(&issued.token, later),
            Err(TokenRejection::InvalidSignature)
        );
    }

    #[test]
    fn test_tampered_token_rejected() {
        let issuer = TokenIssuer::new(&secret(SECRET), TTL);
        let validator = TokenValidator::new(&secret(SECRET));
        let token = issuer.issue_at(&identity(), t0()).unwrap().token;
        let header_len = token.find('.').unwrap();

        for index in (header_len + 1)..token.len() {
            if token.as_bytes()[index] == b'.' {
                continue;
            }
            for bit in 0..7 {
                let mut bytes = token.clone().into_bytes();
                bytes[index] ^= 1 << bit;
                let tampered = String::from_utf8(bytes).unwrap();

                let result = validator.validate_at(&tampered, t0());
                assert!(
                    matches!(
                        result,
                        Err(TokenRejection::Malformed | TokenRejection::InvalidSignature)
                    ),
                    "byte {index} bit {bit} was accepted: {result:?}"
                );
            }
        }
    }

    #[test]
    fn test_malformed_tokens() {
        let validator = TokenValidator::new(&secret(SECRET));

        for token in ["", "garbage", "a.b", "a.b.c", "invalid.token.here", "..."] {
            assert_eq!(
                validator.validate_at(token, t0()),
                Err(TokenRejection::Malformed),
                "token {token:?}"
            );
        }
    }

    #[test]
    fn test_unsigned_token_rejected() {
        let issuer = TokenIssuer::new(&secret(SECRET), TTL);
        let validator = TokenValidator::new(&secret(SECRET));
        let token = issuer.issue_at(&identity(), t0()).unwrap().token;

        // {"alg":"none","typ":"JWT"} with the issued payload and no signature.
        let payload = token.split('.').nth(1).unwrap();
        let unsigned = format!("eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.{payload}.");

        assert!(validator.validate_at(&unsigned, t0()).is_err());
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer("bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer("abc123"), None);
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("Basic dXNlcjpwdw=="), None);
    }

    #[test]
    fn test_peek_claims_without_secret() {
        let issuer = TokenIssuer::new(&secret(SECRET), TTL);
        let token = issuer.issue_at(&identity(), t0()).unwrap().token;

        let claims = peek_claims(&token).unwrap();
        assert_eq!(claims.username, "mod");
        assert_eq!(claims.role, Role::Moderator);

        assert_eq!(peek_claims("garbage"), Err(TokenRejection::Malformed));
    }

    #[test]
    fn test_debug_hides_keys() {
        let issuer = TokenIssuer::new(&secret(SECRET), TTL);
        let validator = TokenValidator::new(&secret(SECRET));
        assert!(!format!("{issuer:?}").contains(SECRET));
        assert!(!format!("{validator:?}").contains(SECRET));
    }
}
