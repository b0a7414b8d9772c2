//! Secret command - generate signing secrets.

use rolegate_core::SigningSecret;

/// Print a fresh random signing secret.
///
/// Hex-encoded 32 random bytes, suitable for `ROLEGATE_JWT_SECRET` or a
/// secret file.
pub fn run_secret_generate() {
    println!("{}", SigningSecret::generate_hex());
}
