//! # Rolegate Core
//!
//! Core types, configuration, and secret handling for Rolegate.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format)
//! - The closed set of roles shared by tokens and the permission policy
//! - Signing secret handling that never leaks through `Debug` or logs

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod secrets;
pub mod types;

pub use config::{AuthSettings, BindMode, Config, ConfigError, GatewayConfig, IdentityRecord, PolicyTable};
pub use secrets::{SecretError, SigningSecret};
pub use types::{Role, UnknownRole};
