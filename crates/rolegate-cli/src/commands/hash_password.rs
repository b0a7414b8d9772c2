//! Hash-password command - produce a PHC hash for the identities config.

use anyhow::{Context, Result, bail};
use rolegate_gateway::auth::{Password, PasswordHasher};

use crate::ui;

/// Hash-password command arguments.
#[derive(Debug, Clone, Default)]
pub struct HashPasswordArgs {
    /// Password given on the command line, if any.
    pub password: Option<String>,
}

/// Run the hash-password command.
///
/// Prints only the hash to stdout so it can be piped into a config file.
pub async fn run_hash_password(args: HashPasswordArgs) -> Result<()> {
    let password = match args.password {
        Some(password) => {
            ui::warning("Passwords given with --password may be kept in shell history");
            Password::new(password)
        }
        None => Password::new(ui::prompts::password_with_confirmation("Password")?),
    };

    let password = password.trimmed();
    if password.expose().is_empty() {
        bail!("Password cannot be empty");
    }

    let hash = tokio::task::spawn_blocking(move || {
        PasswordHasher::default().hash(password.expose())
    })
    .await
    .context("Hashing task failed")??;

    println!("{hash}");

    Ok(())
}
