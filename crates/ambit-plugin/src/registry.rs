use ambit_core::{AmbitError, GrantKind, Result};
use std::collections::BTreeMap;

/// The set of grantable capabilities the host recognises.
///
/// Filled once at host initialization. A grant a plugin requests must be
/// declared here, otherwise composition refuses to boot.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    declared: BTreeMap<GrantKind, String>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every capability the host knows how to enforce.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for kind in GrantKind::ALL {
            // ALL has no repeats, so this cannot fail.
            let _ = registry.declare(kind, default_description(kind));
        }
        registry
    }

    pub fn declare(&mut self, kind: GrantKind, description: &str) -> Result<()> {
        if self.declared.contains_key(&kind) {
            return Err(AmbitError::CapabilityRedeclared(kind));
        }
        self.declared.insert(kind, description.to_string());
        Ok(())
    }

    pub fn is_known(&self, kind: GrantKind) -> bool {
        self.declared.contains_key(&kind)
    }

    pub fn description(&self, kind: GrantKind) -> Option<&str> {
        self.declared.get(&kind).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (GrantKind, &str)> {
        self.declared.iter().map(|(k, d)| (*k, d.as_str()))
    }
}

fn default_description(kind: GrantKind) -> &'static str {
    match kind {
        GrantKind::RouterRouteWrite => "Register HTTP routes",
        GrantKind::RouterMiddlewareWrite => "Wrap every request in middleware",
        GrantKind::SiteStorageRead => "Read the plugin's site settings",
        GrantKind::SiteStorageWrite => "Change the plugin's site settings",
        GrantKind::SitePluginRead => "List installed plugins and their grants",
        GrantKind::EnvironmentRead => "Read environment variables",
    }
}
