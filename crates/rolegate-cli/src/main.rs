//! Rolegate CLI - run and operate the Rolegate auth gateway.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "rolegate")]
#[command(about = "Rolegate - token authentication and role-based access gateway")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (defaults to ~/.rolegate/rolegate.json)
    #[arg(long, global = true, env = "ROLEGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gateway operations
    Gateway {
        #[command(subcommand)]
        action: GatewayCommands,
    },

    /// Hash a password for the identities section of the config
    HashPassword {
        /// Password to hash (prompted for if omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Signing secret utilities
    Secret {
        #[command(subcommand)]
        action: SecretCommands,
    },

    /// Token utilities
    Token {
        #[command(subcommand)]
        action: TokenCommands,
    },

    /// Configuration inspection
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum GatewayCommands {
    /// Start the gateway server
    Run {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (local, public, or IP)
        #[arg(long)]
        bind: Option<String>,

        /// Force start even if port is in use
        #[arg(long)]
        force: bool,
    },

    /// Check gateway status
    Status,
}

#[derive(Subcommand)]
enum SecretCommands {
    /// Print a fresh random signing secret
    Generate,
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Show a token's claims without verifying it
    Decode {
        /// The token, with or without a "Bearer " prefix
        token: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration (secrets redacted)
    Show,

    /// Validate configuration, signing secret and identities
    Validate,
}

fn init_logging(verbose: bool, log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(log_json.then(|| fmt::layer().json()))
        .with((!log_json).then(|| fmt::layer().with_target(false)))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let config_path = cli.config;

    match cli.command {
        Commands::Gateway { action } => {
            let action = match action {
                GatewayCommands::Run { port, bind, force } => {
                    commands::gateway::GatewayAction::Run { port, bind, force }
                }
                GatewayCommands::Status => commands::gateway::GatewayAction::Status,
            };
            commands::run_gateway(commands::gateway::GatewayArgs {
                action,
                config_path,
            })
            .await?;
        }

        Commands::HashPassword { password } => {
            commands::run_hash_password(commands::hash_password::HashPasswordArgs { password })
                .await?;
        }

        Commands::Secret { action } => match action {
            SecretCommands::Generate => commands::run_secret_generate(),
        },

        Commands::Token { action } => match action {
            TokenCommands::Decode { token } => commands::run_token_decode(&token)?,
        },

        Commands::Config { action } => {
            let action = match action {
                Some(ConfigCommands::Validate) => commands::config::ConfigAction::Validate,
                Some(ConfigCommands::Show) | None => commands::config::ConfigAction::Show,
            };
            commands::run_config(commands::config::ConfigArgs {
                action,
                config_path,
            })?;
        }
    }

    Ok(())
}
