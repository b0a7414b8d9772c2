//! Bootstrap admin provisioning.
//!
//! A deployment with no configured identities can provision its first admin
//! from `ROLEGATE_ADMIN_USERNAME` and `ROLEGATE_ADMIN_PASSWORD`. The password
//! is hashed on start-up and never written anywhere.

use rolegate_core::{IdentityRecord, Role};

use super::AuthError;
use super::password::{Password, PasswordHasher};

/// Environment variable naming the bootstrap admin.
pub const ENV_ADMIN_USERNAME: &str = "ROLEGATE_ADMIN_USERNAME";
/// Environment variable holding the bootstrap admin's password.
pub const ENV_ADMIN_PASSWORD: &str = "ROLEGATE_ADMIN_PASSWORD";

/// Add a bootstrap admin using `lookup` to read its username and password.
///
/// Does nothing unless both variables are set. An existing identity with the
/// same username is left untouched. The new admin gets the next free id.
///
/// Returns the id of the added admin, if one was added.
///
/// # Errors
///
/// Returns error if only one of the two variables is set, the password is
/// blank, or hashing fails.
pub fn bootstrap_admin_from<F>(
    records: &mut Vec<IdentityRecord>,
    hasher: &PasswordHasher,
    lookup: F,
) -> Result<Option<u64>, AuthError>
where
    F: Fn(&str) -> Option<String>,
{
    let username = lookup(ENV_ADMIN_USERNAME).map(|u| u.trim().to_string());
    let password = lookup(ENV_ADMIN_PASSWORD).map(Password::new);

    let (username, password) = match (username, password) {
        (None, None) => return Ok(None),
        (Some(username), Some(password)) if !username.is_empty() => (username, password),
        _ => {
            return Err(AuthError::Config(format!(
                "{ENV_ADMIN_USERNAME} and {ENV_ADMIN_PASSWORD} must be set together"
            )));
        }
    };

    if records.iter().any(|r| r.username == username) {
        tracing::debug!(%username, "Bootstrap admin already configured");
        return Ok(None);
    }

    let password = password.trimmed();
    if password.expose().is_empty() {
        return Err(AuthError::Config(format!("{ENV_ADMIN_PASSWORD} is blank")));
    }

    let id = records.iter().map(|r| r.id).max().map_or(1, |max| max + 1);
    records.push(IdentityRecord {
        id,
        username: username.clone(),
        password_hash: hasher.hash(password.expose())?,
        role: Role::Admin,
    });

    tracing::info!(%username, id, "Bootstrap admin provisioned");

    Ok(Some(id))
}
