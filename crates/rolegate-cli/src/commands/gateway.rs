//! Gateway command - start and probe the gateway server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use rolegate_core::BindMode;
use rolegate_gateway::{AuthState, Gateway, GatewayConfig};

use crate::ui;

/// Gateway command arguments.
#[derive(Debug, Clone)]
pub struct GatewayArgs {
    /// Subcommand.
    pub action: GatewayAction,
    /// Config file override.
    pub config_path: Option<PathBuf>,
}

/// Gateway actions.
#[derive(Debug, Clone)]
pub enum GatewayAction {
    Run {
        /// Port to listen on.
        port: Option<u16>,
        /// Bind address.
        bind: Option<String>,
        /// Force start even if the port looks taken.
        force: bool,
    },
    Status,
}

/// Run the gateway command.
pub async fn run_gateway(args: GatewayArgs) -> Result<()> {
    match args.action {
        GatewayAction::Run { port, bind, force } => {
            run_gateway_server(args.config_path, port, bind, force).await
        }
        GatewayAction::Status => gateway_status(args.config_path).await,
    }
}

/// Resolve a `--bind` value: a mode name or a literal address.
fn resolve_bind(bind: &str) -> String {
    match bind {
        "local" | "loopback" => "127.0.0.1".to_string(),
        "public" | "lan" => "0.0.0.0".to_string(),
        addr => addr.to_string(),
    }
}

fn mode_name(mode: &BindMode) -> &'static str {
    match mode {
        BindMode::Local => "local",
        BindMode::Public => "public",
        BindMode::Custom(_) => "custom",
    }
}

fn port_in_use(address: &str) -> bool {
    std::net::TcpListener::bind(address).is_err()
}

/// Start the gateway server.
async fn run_gateway_server(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
    force: bool,
) -> Result<()> {
    let config = super::load_config(config_path.as_deref())?;

    let mut gateway_config = GatewayConfig::from_core(&config.gateway);
    if let Some(port) = port {
        gateway_config.port = port;
    }
    if let Some(bind) = bind {
        gateway_config.bind_address = resolve_bind(&bind);
    }

    let address = format!("{}:{}", gateway_config.bind_address, gateway_config.port);

    if !force && port_in_use(&address) {
        bail!(
            "Port {} is already in use. Use --force to override.",
            gateway_config.port
        );
    }

    let auth = AuthState::from_config(&config).context("Failed to initialize auth")?;

    ui::header("Starting Rolegate Gateway");
    ui::kv("Address", &address);
    ui::kv("Mode", mode_name(&config.gateway.mode));
    ui::kv("Identities", &auth.users().len().to_string());
    ui::kv("Operations", &auth.policy().operations().join(", "));
    ui::kv("Token TTL", &format!("{}s", auth.token_ttl().as_secs()));
    println!();

    ui::info("Press Ctrl+C to stop");
    println!();

    Gateway::new(gateway_config, Arc::new(auth)).run().await?;

    Ok(())
}

/// Check gateway status.
async fn gateway_status(config_path: Option<PathBuf>) -> Result<()> {
    ui::header("Gateway Status");

    let port = super::load_config(config_path.as_deref())
        .map_or(4000, |c| c.gateway.port);

    let client = reqwest::Client::new();
    match client
        .get(format!("http://127.0.0.1:{port}/health"))
        .timeout(Duration::from_secs(2))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            ui::success(&format!("Gateway is running on port {port}"));
            if let Ok(body) = resp.json::<serde_json::Value>().await {
                if let Some(version) = body.get("version").and_then(|v| v.as_str()) {
                    ui::kv("Version", version);
                }
                if let Some(status) = body.get("status").and_then(|v| v.as_str()) {
                    ui::kv("Status", status);
                }
            }
        }
        Ok(resp) => {
            ui::warning(&format!("Health check returned {}", resp.status()));
        }
        Err(_) => {
            ui::warning(&format!("Gateway is not running on port {port}"));
            ui::info("Start with: rolegate gateway run");
        }
    }

    Ok(())
}
