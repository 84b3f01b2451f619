use serde::{Deserialize, Serialize};
use std::fmt;

/// Trust tier assigned to a plugin at composition time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustTier {
    /// Router, template engine, session manager. Every request is approved.
    Core,
    /// Named in the operator's trusted list. Every request is approved.
    Trusted,
    /// Everything else. Only operator-approved grants are approved.
    Plugin,
}

impl fmt::Display for TrustTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrustTier::Core => "core",
            TrustTier::Trusted => "trusted",
            TrustTier::Plugin => "plugin",
        })
    }
}

/// The three roles only a CORE plugin may fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoreRole {
    Router,
    TemplateEngine,
    SessionManager,
}

impl fmt::Display for CoreRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CoreRole::Router => "router",
            CoreRole::TemplateEngine => "template engine",
            CoreRole::SessionManager => "session manager",
        })
    }
}
