//! `ambit grants`: compose against throwaway storage and report the result.

use ambit_config::env::{PASSWORD_HASH_VAR, SESSION_KEY_VAR};
use ambit_config::{Environment, HostConfig, Secrets};
use ambit_core::Result;
use ambit_plugin::Composed;
use ambit_storage::MemoryStorage;
use std::sync::Arc;

use crate::bootstrap;

/// Composition never touches real storage or the real secrets here.
pub(super) async fn compose_offline(config: &HostConfig, env: &Environment) -> Result<Composed> {
    let secrets = Secrets::from_env(&Environment::from_pairs([
        (SESSION_KEY_VAR, "offline"),
        (PASSWORD_HASH_VAR, "!"),
    ]))?;
    bootstrap::compose(config, env, &secrets, Arc::new(MemoryStorage::new())).await
}

pub(super) async fn cmd_grants(config: &HostConfig, env: &Environment, json: bool) -> Result<()> {
    let composed = compose_offline(config, env).await?;
    let records = composed.grants.records();

    if json {
        let out = serde_json::json!({
            "plugins": records,
            "middleware": composed.report.middleware,
            "denied": composed.report.denied,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{:<16} {:<9} {:<8} GRANTS", "PLUGIN", "VERSION", "TIER");
    for r in records {
        let grants = r
            .grants
            .iter()
            .map(|(kind, ok)| if *ok { kind.to_string() } else { format!("!{kind}") })
            .collect::<Vec<_>>()
            .join(", ");
        println!("{:<16} {:<9} {:<8} {}", r.name, r.version, r.tier.to_string(), grants);
    }

    println!();
    println!("Middleware (outermost first): {}", composed.report.middleware.join(" > "));
    if composed.report.denied.is_empty() {
        println!("No registrations were denied.");
    } else {
        println!("Denied registrations:");
        for d in &composed.report.denied {
            println!("  {} {} needs {}", d.plugin, d.operation, d.grant);
        }
    }
    Ok(())
}
