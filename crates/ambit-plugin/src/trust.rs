use crate::descriptor::PluginDescriptor;
use ambit_config::schema::TrustConfig;
use ambit_core::{GrantKind, TrustTier};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Assigns each descriptor a tier and resolves its requested grants.
///
/// Precedence: CORE (by loader slot) > TRUSTED (operator's trusted names) >
/// PLUGIN (only grants in the operator's per-plugin allow-list; everything
/// else is denied).
#[derive(Debug, Clone, Default)]
pub struct TrustClassifier {
    trusted: BTreeSet<String>,
    allow: BTreeMap<String, BTreeSet<GrantKind>>,
}

impl TrustClassifier {
    pub fn new(config: &TrustConfig) -> Self {
        Self {
            trusted: config.trusted.clone(),
            allow: config.grants.clone(),
        }
    }

    pub fn trust(mut self, name: impl Into<String>) -> Self {
        self.trusted.insert(name.into());
        self
    }

    pub fn allow(mut self, name: impl Into<String>, grant: GrantKind) -> Self {
        self.allow.entry(name.into()).or_default().insert(grant);
        self
    }

    pub fn tier_of(&self, descriptor: &PluginDescriptor) -> TrustTier {
        if descriptor.core_role.is_some() {
            TrustTier::Core
        } else if self.trusted.contains(&descriptor.name) {
            TrustTier::Trusted
        } else {
            TrustTier::Plugin
        }
    }

    /// Tier plus one approval decision per requested grant, in request order.
    /// A grant requested twice is reported once.
    pub fn classify_and_approve(
        &self,
        descriptor: &PluginDescriptor,
    ) -> (TrustTier, Vec<(GrantKind, bool)>) {
        let tier = self.tier_of(descriptor);
        let allowed = self.allow.get(&descriptor.name);

        let mut seen = BTreeSet::new();
        let decisions = descriptor
            .grants
            .iter()
            .filter(|r| seen.insert(r.grant))
            .map(|r| {
                let approved = match tier {
                    TrustTier::Core | TrustTier::Trusted => true,
                    TrustTier::Plugin => allowed.is_some_and(|set| set.contains(&r.grant)),
                };
                (r.grant, approved)
            })
            .collect::<Vec<_>>();

        debug!(
            plugin = %descriptor.name,
            tier = %tier,
            approved = decisions.iter().filter(|(_, ok)| *ok).count(),
            requested = decisions.len(),
            "plugin classified"
        );
        (tier, decisions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginFeatures;
    use ambit_core::{CoreRole, GrantRequest};

    fn descriptor(name: &str, core: Option<CoreRole>, grants: &[GrantKind]) -> PluginDescriptor {
        PluginDescriptor {
            name: name.into(),
            version: "1.0.0".into(),
            grants: grants.iter().map(|g| GrantRequest::new(*g, "needed")).collect(),
            core_role: core,
            features: PluginFeatures::default(),
            plugin: None,
        }
    }

    #[test]
    fn core_ignores_allow_list() {
        let classifier = TrustClassifier::default();
        let d = descriptor(
            "sessionmanager",
            Some(CoreRole::SessionManager),
            &[GrantKind::RouterMiddlewareWrite, GrantKind::SiteStorageWrite],
        );
        let (tier, grants) = classifier.classify_and_approve(&d);
        assert_eq!(tier, TrustTier::Core);
        assert!(grants.iter().all(|(_, ok)| *ok));
    }

    #[test]
    fn core_name_without_slot_is_not_core() {
        let classifier = TrustClassifier::default();
        let d = descriptor("core-router", None, &[GrantKind::RouterRouteWrite]);
        let (tier, grants) = classifier.classify_and_approve(&d);
        assert_eq!(tier, TrustTier::Plugin);
        assert_eq!(grants, vec![(GrantKind::RouterRouteWrite, false)]);
    }

    #[test]
    fn trusted_gets_everything() {
        let classifier = TrustClassifier::default().trust("hello");
        let d = descriptor("hello", None, &[GrantKind::RouterRouteWrite, GrantKind::EnvironmentRead]);
        let (tier, grants) = classifier.classify_and_approve(&d);
        assert_eq!(tier, TrustTier::Trusted);
        assert_eq!(
            grants,
            vec![(GrantKind::RouterRouteWrite, true), (GrantKind::EnvironmentRead, true)]
        );
    }

    #[test]
    fn plugin_tier_fails_closed() {
        let classifier = TrustClassifier::default().allow("hello", GrantKind::SiteStorageRead);
        let d = descriptor(
            "hello",
            None,
            &[GrantKind::RouterRouteWrite, GrantKind::SiteStorageRead, GrantKind::RouterRouteWrite],
        );
        let (tier, grants) = classifier.classify_and_approve(&d);
        assert_eq!(tier, TrustTier::Plugin);
        assert_eq!(
            grants,
            vec![(GrantKind::RouterRouteWrite, false), (GrantKind::SiteStorageRead, true)]
        );
    }

    #[test]
    fn built_from_config() {
        let classifier = TrustClassifier::new(&TrustConfig::default());
        let d = descriptor("gzip", None, &[GrantKind::RouterMiddlewareWrite]);
        assert_eq!(classifier.classify_and_approve(&d).1, vec![(GrantKind::RouterMiddlewareWrite, true)]);
        let d = descriptor("login", None, &[GrantKind::SiteStorageWrite]);
        assert_eq!(classifier.tier_of(&d), TrustTier::Trusted);
    }
}
