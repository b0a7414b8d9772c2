//! Configuration loading and validation.
//!
//! Config is JSON5 with camelCase keys.
//! Config location: `~/.rolegate/rolegate.json` (or `$ROLEGATE_STATE_DIR/rolegate.json`)
//!
//! The signing secret is never given a default. It must come from
//! `ROLEGATE_JWT_SECRET`, a secret file, or the config file itself.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::secrets::{SecretError, SigningSecret};
use crate::types::Role;

/// Environment variable holding the signing secret.
pub const ENV_JWT_SECRET: &str = "ROLEGATE_JWT_SECRET";
/// Environment variable pointing at a file holding the signing secret.
pub const ENV_JWT_SECRET_FILE: &str = "ROLEGATE_JWT_SECRET_FILE";
/// Environment variable overriding the listen port.
pub const ENV_PORT: &str = "ROLEGATE_PORT";
/// Environment variable overriding the state directory.
pub const ENV_STATE_DIR: &str = "ROLEGATE_STATE_DIR";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Signing secret could not be loaded.
    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Token settings.
    #[serde(default)]
    pub auth: AuthSettings,

    /// Identities seeded into the credential store at start-up.
    #[serde(default)]
    pub identities: Vec<IdentityRecord>,

    /// Operation to allowed-roles table.
    #[serde(default)]
    pub policy: PolicyTable,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json5(&content)?;
        tracing::debug!(path = %path.display(), identities = config.identities.len(), "Loaded config");
        Ok(config)
    }

    /// Parse and validate configuration from a JSON5 string.
    ///
    /// # Errors
    ///
    /// Returns error if the text cannot be parsed or fails validation.
    pub fn from_json5(content: &str) -> Result<Self, ConfigError> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("rolegate.json")
    }

    /// Get the Rolegate state directory.
    ///
    /// Uses `ROLEGATE_STATE_DIR` env var if set, otherwise `~/.rolegate`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".rolegate")
        } else {
            PathBuf::from(".rolegate")
        }
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns error if an override value is invalid.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// An inline secret override wins over any secret file.
    ///
    /// # Errors
    ///
    /// Returns error if an override value is invalid.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(secret) = non_empty(ENV_JWT_SECRET) {
            self.auth.jwt_secret = Some(SigningSecret::new(secret)?);
            self.auth.jwt_secret_file = None;
        } else if let Some(file) = non_empty(ENV_JWT_SECRET_FILE) {
            self.auth.jwt_secret_file = Some(PathBuf::from(file));
        }

        if let Some(port) = non_empty(ENV_PORT) {
            self.gateway.port = port
                .parse()
                .map_err(|e| ConfigError::Validation(format!("{ENV_PORT}={port}: {e}")))?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::Validation(
                "Gateway port cannot be 0".to_string(),
            ));
        }

        if self.gateway.login_attempts_per_minute == 0 {
            return Err(ConfigError::Validation(
                "loginAttemptsPerMinute must be positive".to_string(),
            ));
        }

        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "tokenTtlSecs must be positive".to_string(),
            ));
        }

        let mut usernames = HashSet::new();
        let mut ids = HashSet::new();
        for identity in &self.identities {
            if identity.username.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Identity {} has an empty username",
                    identity.id
                )));
            }
            if !usernames.insert(identity.username.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate username '{}'",
                    identity.username
                )));
            }
            if !ids.insert(identity.id) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate identity id {}",
                    identity.id
                )));
            }
        }

        Ok(())
    }
}

/// Gateway server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address mode.
    #[serde(default)]
    pub mode: BindMode,

    /// Enable CORS.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Browser origins allowed by CORS.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Login attempts allowed per client per minute.
    #[serde(default = "default_login_attempts")]
    pub login_attempts_per_minute: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            mode: BindMode::default(),
            cors: true,
            cors_origins: default_cors_origins(),
            timeout_secs: default_timeout(),
            login_attempts_per_minute: default_login_attempts(),
        }
    }
}

impl GatewayConfig {
    /// Address to bind, derived from the bind mode.
    #[must_use]
    pub fn bind_address(&self) -> String {
        match &self.mode {
            BindMode::Local => "127.0.0.1".to_string(),
            BindMode::Public => "0.0.0.0".to_string(),
            BindMode::Custom(addr) => addr.clone(),
        }
    }
}

const fn default_port() -> u16 {
    4000
}

const fn default_timeout() -> u64 {
    30
}

const fn default_login_attempts() -> u32 {
    30
}

const fn default_true() -> bool {
    true
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

/// Gateway bind mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    /// Bind to localhost only.
    #[default]
    Local,
    /// Bind to all interfaces.
    Public,
    /// Custom bind address.
    Custom(String),
}

/// Token settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSettings {
    /// Inline signing secret. Prefer `ROLEGATE_JWT_SECRET` or a secret file.
    #[serde(default)]
    pub jwt_secret: Option<SigningSecret>,

    /// File containing the signing secret.
    #[serde(default)]
    pub jwt_secret_file: Option<PathBuf>,

    /// Token lifetime in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

const fn default_token_ttl() -> u64 {
    3600
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_secret_file: None,
            token_ttl_secs: default_token_ttl(),
        }
    }
}

impl AuthSettings {
    /// Resolve the signing secret.
    ///
    /// A configured secret file takes precedence over an inline secret.
    ///
    /// # Errors
    ///
    /// Returns error if no secret is configured or the file cannot be read.
    pub fn signing_secret(&self) -> Result<SigningSecret, ConfigError> {
        if let Some(path) = &self.jwt_secret_file {
            return Ok(SigningSecret::from_file(path)?);
        }

        self.jwt_secret.clone().ok_or_else(|| {
            ConfigError::MissingField(format!(
                "auth.jwtSecret (set {ENV_JWT_SECRET} or {ENV_JWT_SECRET_FILE})"
            ))
        })
    }
}

/// An identity seeded from configuration.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    /// Opaque numeric ID.
    pub id: u64,
    /// Unique login name.
    pub username: String,
    /// PHC-format password hash (algorithm, parameters and salt embedded).
    pub password_hash: String,
    /// Assigned role.
    pub role: Role,
}

impl std::fmt::Debug for IdentityRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Operation identifier to allowed roles.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PolicyTable(pub BTreeMap<String, BTreeSet<Role>>);

impl Default for PolicyTable {
    fn default() -> Self {
        let mut table = BTreeMap::new();
        table.insert(
            "profile".to_string(),
            BTreeSet::from([Role::Admin, Role::Moderator, Role::User]),
        );
        table.insert(
            "moderator".to_string(),
            BTreeSet::from([Role::Admin, Role::Moderator]),
        );
        table.insert("admin".to_string(), BTreeSet::from([Role::Admin]));
        Self(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-that-is-at-least-32-bytes-long";

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway.port, 4000);
        assert_eq!(config.gateway.bind_address(), "127.0.0.1");
        assert_eq!(config.auth.token_ttl_secs, 3600);
        assert!(config.auth.jwt_secret.is_none());
        assert!(config.identities.is_empty());
        assert_eq!(config.policy, PolicyTable::default());
    }

    #[test]
    fn test_default_policy_table() {
        let table = PolicyTable::default().0;
        assert_eq!(table["profile"].len(), 3);
        assert_eq!(
            table["moderator"],
            BTreeSet::from([Role::Admin, Role::Moderator])
        );
        assert_eq!(table["admin"], BTreeSet::from([Role::Admin]));
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_json5(&format!(
            r#"{{
                // comments are allowed
                gateway: {{ port: 8080, mode: "public", corsOrigins: ["https://app.example"] }},
                auth: {{ jwtSecret: "{SECRET}", tokenTtlSecs: 600 }},
                identities: [
                    {{ id: 1, username: "admin", passwordHash: "$argon2id$x", role: "Admin" }},
                    {{ id: 2, username: "user", passwordHash: "$argon2id$y", role: "User" }},
                ],
                policy: {{ reports: ["Admin", "Moderator"] }},
            }}"#
        ))
        .unwrap();

        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.mode, BindMode::Public);
        assert_eq!(config.gateway.cors_origins, vec!["https://app.example"]);
        assert_eq!(config.auth.token_ttl_secs, 600);
        assert_eq!(config.identities.len(), 2);
        assert_eq!(config.identities[1].role, Role::User);
        assert_eq!(config.policy.0.len(), 1);
        assert!(config.policy.0.contains_key("reports"));
        assert!(config.auth.signing_secret().is_ok());
    }

    #[test]
    fn test_custom_bind_mode() {
        let config = Config::from_json5(r#"{ gateway: { mode: { custom: "10.1.2.3" } } }"#).unwrap();
        assert_eq!(config.gateway.bind_address(), "10.1.2.3");
    }

    #[test]
    fn test_policy_role_typo_is_rejected() {
        let result = Config::from_json5(r#"{ policy: { admin: ["Admn"] } }"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let result = Config::from_json5(
            r#"{ identities: [
                { id: 1, username: "a", passwordHash: "h", role: "User" },
                { id: 2, username: "a", passwordHash: "h", role: "Admin" },
            ] }"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let result = Config::from_json5(
            r#"{ identities: [
                { id: 7, username: "a", passwordHash: "h", role: "User" },
                { id: 7, username: "b", passwordHash: "h", role: "User" },
            ] }"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_zero_port_rejected() {
        let result = Config::from_json5("{ gateway: { port: 0 } }");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_missing_secret() {
        let config = Config::default();
        assert!(matches!(
            config.auth.signing_secret(),
            Err(ConfigError::MissingField(_))
        ));
    }

    #[test]
    fn test_env_secret_override() {
        let config = Config::default()
            .with_overrides_from(env(&[(ENV_JWT_SECRET, SECRET), (ENV_PORT, "9000")]))
            .unwrap();
        assert_eq!(config.auth.signing_secret().unwrap().expose(), SECRET.as_bytes());
        assert_eq!(config.gateway.port, 9000);
    }

    #[test]
    fn test_env_secret_file_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jwt.secret");
        std::fs::write(&path, format!("{SECRET}\n")).unwrap();

        let config = Config::default()
            .with_overrides_from(env(&[(ENV_JWT_SECRET_FILE, path.to_str().unwrap())]))
            .unwrap();
        assert_eq!(config.auth.signing_secret().unwrap().expose(), SECRET.as_bytes());
    }

    #[test]
    fn test_env_short_secret_rejected() {
        let result = Config::default().with_overrides_from(env(&[(ENV_JWT_SECRET, "short")]));
        assert!(matches!(result, Err(ConfigError::Secret(SecretError::TooShort(5)))));
    }

    #[test]
    fn test_env_invalid_port() {
        let result = Config::default().with_overrides_from(env(&[(ENV_PORT, "http")]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rolegate.json");
        std::fs::write(&path, "{ auth: { tokenTtlSecs: 120 } }").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.auth.token_ttl_secs, 120);
    }

    #[test]
    fn test_identity_debug_hides_hash() {
        let record = IdentityRecord {
            id: 1,
            username: "admin".to_string(),
            password_hash: "$argon2id$secret-hash".to_string(),
            role: Role::Admin,
        };
        let debug = format!("{record:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("secret-hash"));
    }
}
