//! # ambit-cli
//!
//! Command-line interface and boot sequence for the Ambit host.
//!
//! ## Commands
//!
//! - `ambit serve` (default): boot the host and serve until Ctrl-C/SIGTERM
//! - `ambit config`: print the effective configuration
//! - `ambit grants`: compose offline and print every plugin's tier and grants
//! - `ambit hash-password`: produce a value for `AMB_PASSWORD_HASH`
//! - `ambit version`

pub mod app;
pub mod bootstrap;
pub mod commands;
pub mod logging;

pub use commands::Cli;
