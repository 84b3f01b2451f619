use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One discrete permission a plugin can request from the host.
///
/// The set is closed: plugins choose from these variants and cannot invent new
/// ones. Operator configuration refers to them by their kebab-case names, and
/// deserialization rejects any name not listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrantKind {
    /// Register HTTP routes on the router.
    RouterRouteWrite,
    /// Attach middleware to the request chain.
    RouterMiddlewareWrite,
    /// Read the plugin's namespace in the site record.
    SiteStorageRead,
    /// Write the plugin's namespace in the site record.
    SiteStorageWrite,
    /// List loaded plugins, their tiers, and their grants.
    SitePluginRead,
    /// Read variables from the captured process environment.
    EnvironmentRead,
}

impl GrantKind {
    pub const ALL: [GrantKind; 6] = [
        GrantKind::RouterRouteWrite,
        GrantKind::RouterMiddlewareWrite,
        GrantKind::SiteStorageRead,
        GrantKind::SiteStorageWrite,
        GrantKind::SitePluginRead,
        GrantKind::EnvironmentRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GrantKind::RouterRouteWrite => "router-route-write",
            GrantKind::RouterMiddlewareWrite => "router-middleware-write",
            GrantKind::SiteStorageRead => "site-storage-read",
            GrantKind::SiteStorageWrite => "site-storage-write",
            GrantKind::SitePluginRead => "site-plugin-read",
            GrantKind::EnvironmentRead => "environment-read",
        }
    }
}

impl fmt::Display for GrantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GrantKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown grant '{s}'"))
    }
}

/// A grant requested by a plugin, with the reason it gives the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRequest {
    pub grant: GrantKind,
    pub description: String,
}

impl GrantRequest {
    pub fn new(grant: GrantKind, description: impl Into<String>) -> Self {
        Self {
            grant,
            description: description.into(),
        }
    }
}
