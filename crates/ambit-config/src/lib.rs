//! # ambit-config
//!
//! Configuration system for the Ambit host. Reads from `ambit.toml` and a
//! captured environment snapshot, in that precedence order (environment wins).
//!
//! The environment is captured once at boot, optionally overlaid with a local
//! `.env` file in development mode, and then passed around explicitly. Nothing
//! downstream re-reads process variables.

pub mod env;
pub mod loader;
pub mod schema;

pub use env::{Environment, Secrets};
pub use loader::ConfigLoader;
pub use schema::{ConfigWarning, HostConfig, WarningSeverity};
