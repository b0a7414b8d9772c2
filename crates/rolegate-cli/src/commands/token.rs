//! Token command - inspect issued tokens.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rolegate_gateway::auth::{extract_bearer, peek_claims};

use crate::ui;

/// Show a token's claims without checking its signature.
pub fn run_token_decode(token: &str) -> Result<()> {
    let token = extract_bearer(token).unwrap_or_else(|| token.trim());
    let claims = peek_claims(token).context("Token could not be decoded")?;

    ui::header("Token Claims");
    ui::warning("Signature not verified");
    ui::kv("ID", &claims.id.to_string());
    ui::kv("Username", &claims.username);
    ui::kv("Role", claims.role.as_str());
    ui::kv("Issued", &format_timestamp(claims.iat));
    ui::kv("Expires", &format_timestamp(claims.exp));

    if Utc::now().timestamp() >= claims.exp {
        ui::error("Token has expired");
    } else {
        ui::success("Token has not expired");
    }

    Ok(())
}

fn format_timestamp(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map_or_else(|| timestamp.to_string(), |t| t.to_rfc3339())
}
