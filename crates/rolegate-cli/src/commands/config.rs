//! Config command - show and validate configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rolegate_core::Config;
use rolegate_core::config::{ENV_JWT_SECRET, ENV_JWT_SECRET_FILE};
use rolegate_gateway::AuthState;

use crate::ui;

/// Config command arguments.
#[derive(Debug, Clone)]
pub struct ConfigArgs {
    /// Subcommand.
    pub action: ConfigAction,
    /// Config file override.
    pub config_path: Option<PathBuf>,
}

/// Config actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    Show,
    Validate,
}

/// Run the config command.
pub fn run_config(args: ConfigArgs) -> Result<()> {
    let path = args
        .config_path
        .clone()
        .unwrap_or_else(Config::default_path);

    match args.action {
        ConfigAction::Show => show_config(args.config_path.as_deref(), &path),
        ConfigAction::Validate => validate_config(args.config_path.as_deref(), &path),
    }
}

/// Describe where the signing secret comes from, never the secret itself.
fn secret_source(config: &Config) -> String {
    if let Some(file) = &config.auth.jwt_secret_file {
        format!("file {}", file.display())
    } else if config.auth.jwt_secret.is_some() {
        "inline [REDACTED]".to_string()
    } else {
        format!("not set ({ENV_JWT_SECRET} or {ENV_JWT_SECRET_FILE})")
    }
}

/// Show the effective configuration.
fn show_config(override_path: Option<&Path>, path: &Path) -> Result<()> {
    if !path.exists() {
        ui::info(&format!(
            "No config file at {}, showing defaults",
            path.display()
        ));
    }

    let config = super::load_config(override_path)?;

    ui::header("Gateway");
    ui::kv("Port", &config.gateway.port.to_string());
    ui::kv("Bind address", &config.gateway.bind_address());
    ui::kv("CORS", &config.gateway.cors.to_string());
    ui::kv("CORS origins", &config.gateway.cors_origins.join(", "));
    ui::kv("Timeout", &format!("{}s", config.gateway.timeout_secs));
    ui::kv(
        "Login attempts/min",
        &config.gateway.login_attempts_per_minute.to_string(),
    );

    ui::header("Auth");
    ui::kv("Signing secret", &secret_source(&config));
    ui::kv("Token TTL", &format!("{}s", config.auth.token_ttl_secs));

    ui::header("Identities");
    if config.identities.is_empty() {
        ui::info("None configured");
    } else {
        ui::table_row(&[("ID", 6), ("USERNAME", 20), ("ROLE", 10)]);
        for identity in &config.identities {
            let id = identity.id.to_string();
            ui::table_row(&[
                (id.as_str(), 6),
                (identity.username.as_str(), 20),
                (identity.role.as_str(), 10),
            ]);
        }
    }

    ui::header("Policy");
    for (operation, roles) in &config.policy.0 {
        let roles: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
        ui::kv(operation, &roles.join(", "));
    }

    Ok(())
}

/// Validate configuration by building the full auth state from it.
fn validate_config(override_path: Option<&Path>, path: &Path) -> Result<()> {
    ui::header("Validating configuration");
    ui::kv("File", &path.display().to_string());

    let config = super::load_config(override_path)?;
    ui::success("Config parsed");

    let auth = AuthState::from_config(&config).context("Auth configuration is invalid")?;
    ui::success("Signing secret loaded");
    ui::success(&format!("{} identities loaded", auth.users().len()));
    ui::success(&format!(
        "{} operations in policy",
        auth.policy().operations().len()
    ));

    Ok(())
}
