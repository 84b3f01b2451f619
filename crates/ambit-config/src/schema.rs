use ambit_core::GrantKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Root configuration, mapped from `ambit.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub trust: TrustConfig,
}

// ── Server ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address.
    pub listen: String,
    /// Path prefix added by a reverse proxy, stripped before routing.
    pub url_prefix: Option<String>,
    /// Requests below this prefix receive CORS headers.
    pub cors_prefix: String,
    /// Path answered with `200 ok` by the healthcheck middleware.
    pub healthcheck_path: String,
    /// Public base URL, e.g. `https://example.com`. Requests for any other
    /// host are redirected there.
    pub canonical_url: Option<String>,
    /// Trust `x-forwarded-for` / `x-real-ip` for client addresses. Only
    /// enable behind a reverse proxy that overwrites them.
    pub trust_proxy_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".into(),
            url_prefix: None,
            cors_prefix: "/api/".into(),
            healthcheck_path: "/api/healthcheck".into(),
            canonical_url: None,
            trust_proxy_headers: false,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Storage ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Logical path of the encrypted site record.
    pub site_path: String,
    /// Logical path of the encrypted session record.
    pub session_path: String,
    /// Object-store base URL. When set, records are stored remotely instead of
    /// on the local filesystem.
    pub bucket_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            site_path: "storage/site.bin".into(),
            session_path: "storage/session.bin".into(),
            bucket_url: None,
        }
    }
}

// ── Session ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    /// Lifetime of a session in seconds, counted from its last write. Reads
    /// do not extend it.
    pub lifetime_secs: u64,
    /// Mark the cookie `Secure` (HTTPS only).
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session".into(),
            lifetime_secs: 86_400,
            secure_cookie: false,
        }
    }
}

// ── Trust ──────────────────────────────────────────────────────

/// Operator trust policy.
///
/// `trusted` names plugins that receive every grant they request. `grants` is
/// the per-plugin allow-list for everything else; a grant absent from it is
/// denied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    pub trusted: BTreeSet<String>,
    pub grants: BTreeMap<String, BTreeSet<GrantKind>>,
}

impl Default for TrustConfig {
    fn default() -> Self {
        let middleware = [
            "logrequest",
            "urlrewrite",
            "gzip",
            "etagcache",
            "redirecttourl",
            "cors",
            "healthcheck",
            "uptimerobotok",
            "notrailingslash",
            "ratelimit",
        ];
        Self {
            trusted: ["pluginmanager", "login"]
                .into_iter()
                .map(String::from)
                .collect(),
            grants: middleware
                .into_iter()
                .map(|name| {
                    (
                        name.to_string(),
                        BTreeSet::from([GrantKind::RouterMiddlewareWrite]),
                    )
                })
                .chain([(
                    "envinfo".to_string(),
                    BTreeSet::from([GrantKind::RouterRouteWrite, GrantKind::EnvironmentRead]),
                )])
                .collect(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
            WarningSeverity::Info => "info",
        };
        write!(f, "{}: {}: {}", label, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, " ({})", h)?;
        }
        Ok(())
    }
}

impl HostConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Server listen address ───
        if self.server.listen.trim().is_empty() {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "listen address is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. '127.0.0.1:8080'".into()),
            });
        } else if self.server.listen.starts_with("0.0.0.0") {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "binding to 0.0.0.0: server is accessible from all interfaces".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }

        // ── URL prefix ───
        if let Some(ref prefix) = self.server.url_prefix {
            if !prefix.starts_with('/') || (prefix.len() > 1 && prefix.ends_with('/')) {
                warnings.push(ConfigWarning {
                    field: "server.url_prefix".into(),
                    message: format!("prefix '{}' must start with '/' and not end with '/'", prefix),
                    severity: WarningSeverity::Error,
                    hint: Some("Use e.g. '/blog'".into()),
                });
            }
        }

        // ── Canonical URL ───
        if let Some(ref url) = self.server.canonical_url {
            let host = url
                .strip_prefix("https://")
                .or_else(|| url.strip_prefix("http://"))
                .unwrap_or_default();
            if host.is_empty() || host.contains('/') {
                warnings.push(ConfigWarning {
                    field: "server.canonical_url".into(),
                    message: format!("'{url}' must be a scheme and host without a path"),
                    severity: WarningSeverity::Error,
                    hint: Some("Use e.g. 'https://example.com'".into()),
                });
            }
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Error,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // ── Storage paths ───
        if self.storage.site_path.is_empty() || self.storage.session_path.is_empty() {
            warnings.push(ConfigWarning {
                field: "storage".into(),
                message: "site_path and session_path must both be set".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        } else if self.storage.site_path == self.storage.session_path {
            warnings.push(ConfigWarning {
                field: "storage.session_path".into(),
                message: "site and session records share one path".into(),
                severity: WarningSeverity::Error,
                hint: Some("Use e.g. 'storage/site.bin' and 'storage/session.bin'".into()),
            });
        }

        // ── Session lifetime ───
        if self.session.lifetime_secs == 0 {
            warnings.push(ConfigWarning {
                field: "session.lifetime_secs".into(),
                message: "lifetime is 0, every session expires immediately".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 86400".into()),
            });
        }

        // ── Trust policy ───
        for name in self.trust.grants.keys() {
            if self.trust.trusted.contains(name) {
                warnings.push(ConfigWarning {
                    field: format!("trust.grants.{}", name),
                    message: format!("'{}' is trusted; its allow-list is ignored", name),
                    severity: WarningSeverity::Warning,
                    hint: None,
                });
            }
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
