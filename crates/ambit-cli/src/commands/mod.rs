use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ambit_core::{AmbitError, Result};

use crate::{bootstrap, logging};

mod grants;

/// Ambit: a capability-gated plugin host
#[derive(Parser)]
#[command(name = "ambit", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to ambit.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Boot the host and serve HTTP (the default)
    Serve,
    /// Show the effective configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compose without serving and show every plugin's trust tier and grants
    Grants {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Hash a password for AMB_PASSWORD_HASH
    HashPassword { password: String },
    /// Show version and build info
    Version,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let command = self.command.unwrap_or(Commands::Serve);
        match command {
            Commands::HashPassword { ref password } => return Self::cmd_hash_password(password),
            Commands::Version => return Self::cmd_version(),
            _ => {}
        }

        // Environment and config come first so logging can use them.
        let env = bootstrap::environment()?;
        let config_loader = bootstrap::load_config(self.config.as_deref(), &env)?;
        let config = config_loader.get();

        let level = logging::resolve_level(
            self.verbose,
            self.quiet,
            self.log_level.as_deref(),
            &config.logging.level,
        );
        logging::init(&config.logging.format, level);
        tracing::debug!(path = %config_loader.path().display(), "configuration resolved");

        match command {
            Commands::Serve => bootstrap::serve(config, env).await,
            Commands::Config { json } => Self::cmd_config(&config, json),
            Commands::Grants { json } => grants::cmd_grants(&config, &env, json).await,
            Commands::HashPassword { .. } | Commands::Version => Ok(()),
        }
    }

    fn cmd_config(config: &ambit_config::HostConfig, json: bool) -> Result<()> {
        let rendered = if json {
            serde_json::to_string_pretty(config)?
        } else {
            toml::to_string_pretty(config).map_err(anyhow::Error::from)?
        };
        println!("{rendered}");
        Ok(())
    }

    fn cmd_hash_password(password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(AmbitError::Config("password must not be empty".into()));
        }
        println!("{}", ambit_plugins::hash_password(password)?);
        Ok(())
    }

    fn cmd_version() -> Result<()> {
        println!("ambit v{}", env!("CARGO_PKG_VERSION"));
        println!("   Rust edition: 2024");
        println!("   Target: {}", std::env::consts::ARCH);
        println!("   OS: {}", std::env::consts::OS);
        #[cfg(debug_assertions)]
        println!("   Profile: debug");
        #[cfg(not(debug_assertions))]
        println!("   Profile: release");
        Ok(())
    }
}
