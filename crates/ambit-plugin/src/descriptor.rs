use crate::plugin::{Plugin, PluginFeatures};
use crate::registry::CapabilityRegistry;
use ambit_core::{AmbitError, CoreRole, GrantRequest, Result};
use semver::Version;
use std::sync::Arc;

/// Everything the host knows about a loaded plugin before it is classified.
///
/// Built by the loader from the plugin's own self-report. `core_role` is only
/// ever set for the loader's CORE slots; a plugin cannot claim it.
#[derive(Clone)]
pub struct PluginDescriptor {
    pub name: String,
    pub version: String,
    pub grants: Vec<GrantRequest>,
    pub core_role: Option<CoreRole>,
    pub features: PluginFeatures,
    /// Handle used to bind routes and middleware. `None` for the router and
    /// template engine, which the host drives directly.
    pub plugin: Option<Arc<dyn Plugin>>,
}

impl PluginDescriptor {
    pub(crate) fn describe<P: Plugin + ?Sized>(plugin: &P, core_role: Option<CoreRole>) -> Self {
        Self {
            name: plugin.name().to_string(),
            version: plugin.version().to_string(),
            grants: plugin.grant_requests(),
            core_role,
            features: plugin.features(),
            plugin: None,
        }
    }

    pub(crate) fn with_handle(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugin = Some(plugin);
        self
    }

    /// Structural checks on the self-report: name shape, semver version, and
    /// every requested grant known to `registry` with a justification.
    pub fn validate(&self, registry: &CapabilityRegistry) -> Result<()> {
        if self.name.is_empty() {
            return Err(AmbitError::InvalidPlugin {
                plugin: "<unnamed>".into(),
                reason: "name is empty".into(),
            });
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(self.invalid("name must match [a-z0-9_-]+"));
        }
        if let Err(e) = Version::parse(&self.version) {
            return Err(self.invalid(format!("version '{}' is not semver: {e}", self.version)));
        }
        for request in &self.grants {
            if !registry.is_known(request.grant) {
                return Err(AmbitError::UnknownGrant {
                    plugin: self.name.clone(),
                    grant: request.grant,
                });
            }
            if request.description.trim().is_empty() {
                return Err(self.invalid(format!("grant {} has no justification", request.grant)));
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: impl Into<String>) -> AmbitError {
        AmbitError::InvalidPlugin {
            plugin: self.name.clone(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("grants", &self.grants)
            .field("core_role", &self.core_role)
            .field("features", &self.features)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambit_core::GrantKind;

    fn descriptor(name: &str, version: &str, grants: Vec<GrantRequest>) -> PluginDescriptor {
        PluginDescriptor {
            name: name.into(),
            version: version.into(),
            grants,
            core_role: None,
            features: PluginFeatures::default(),
            plugin: None,
        }
    }

    #[test]
    fn valid_descriptor_passes() {
        let d = descriptor(
            "hello",
            "1.2.3",
            vec![GrantRequest::new(GrantKind::RouterRouteWrite, "pages")],
        );
        d.validate(&CapabilityRegistry::standard()).unwrap();
    }

    #[test]
    fn rejects_bad_names_and_versions() {
        let registry = CapabilityRegistry::standard();
        assert!(descriptor("", "1.0.0", vec![]).validate(&registry).is_err());
        assert!(descriptor("Hello World", "1.0.0", vec![]).validate(&registry).is_err());
        let err = descriptor("hello", "one", vec![]).validate(&registry).unwrap_err();
        assert!(matches!(err, AmbitError::InvalidPlugin { .. }));
    }

    #[test]
    fn rejects_undeclared_grant() {
        let mut registry = CapabilityRegistry::new();
        registry.declare(GrantKind::RouterRouteWrite, "routes").unwrap();
        let d = descriptor(
            "hello",
            "1.0.0",
            vec![GrantRequest::new(GrantKind::EnvironmentRead, "prefix")],
        );
        let err = d.validate(&registry).unwrap_err();
        assert!(matches!(err, AmbitError::UnknownGrant { grant: GrantKind::EnvironmentRead, .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn rejects_blank_justification() {
        let d = descriptor(
            "hello",
            "1.0.0",
            vec![GrantRequest::new(GrantKind::RouterRouteWrite, "  ")],
        );
        assert!(d.validate(&CapabilityRegistry::standard()).is_err());
    }
}
