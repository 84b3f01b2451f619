use tracing_subscriber::EnvFilter;

/// `--verbose` > `--quiet` > `--log-level` > the configured level (which
/// already carries `AMB_LOG_LEVEL`).
pub fn resolve_level<'a>(
    verbose: bool,
    quiet: bool,
    flag: Option<&'a str>,
    configured: &'a str,
) -> &'a str {
    if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        flag.unwrap_or(configured)
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `level`.
///
/// When a subscriber cannot be installed the process keeps going and fatal
/// errors still reach stderr from `main`.
pub fn init(format: &str, level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let installed = match format {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .try_init(),
        "compact" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .with_target(false)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
    };
    if let Err(e) = installed {
        eprintln!("logging unavailable, falling back to stderr: {e}");
    }
}
