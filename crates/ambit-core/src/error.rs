use thiserror::Error;

use crate::grant::GrantKind;
use crate::types::CoreRole;

/// Unified error type for the entire Ambit host.
#[derive(Error, Debug)]
pub enum AmbitError {
    // ── Configuration errors ───────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    #[error("environment variable missing: {0}")]
    MissingSecret(String),

    #[error("duplicate plugin name: {0}")]
    DuplicatePlugin(String),

    #[error("missing required core plugin: {0}")]
    MissingCoreRole(CoreRole),

    #[error("plugin {plugin} requested unknown grant: {grant}")]
    UnknownGrant { plugin: String, grant: GrantKind },

    #[error("invalid plugin: {plugin}: {reason}")]
    InvalidPlugin { plugin: String, reason: String },

    #[error("grant already recorded: {plugin}: {grant}")]
    GrantAlreadyRecorded { plugin: String, grant: GrantKind },

    #[error("capability declared twice: {0}")]
    CapabilityRedeclared(GrantKind),

    // ── Permission errors ──────────────────────────────────────
    #[error("permission denied: {plugin} lacks grant {grant}")]
    PermissionDenied { plugin: String, grant: GrantKind },

    // ── Storage errors ─────────────────────────────────────────
    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {path}: {reason}")]
    Storage { path: String, reason: String },

    #[error("decryption failed: {0}")]
    Decryption(String),

    // ── Runtime errors ─────────────────────────────────────────
    #[error("handler error: {plugin}: {reason}")]
    Handler { plugin: String, reason: String },

    #[error("template error: {page}: {reason}")]
    Template { page: String, reason: String },

    #[error("server error: {0}")]
    Server(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of an [`AmbitError`].
///
/// Configuration errors abort boot, permission errors disable a single
/// capability, storage errors surface to the caller of the storage facade, and
/// runtime errors are isolated to the request that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Configuration,
    Permission,
    Storage,
    Runtime,
}

impl AmbitError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AmbitError::Config(_)
            | AmbitError::ConfigValidation { .. }
            | AmbitError::MissingSecret(_)
            | AmbitError::DuplicatePlugin(_)
            | AmbitError::MissingCoreRole(_)
            | AmbitError::UnknownGrant { .. }
            | AmbitError::InvalidPlugin { .. }
            | AmbitError::GrantAlreadyRecorded { .. }
            | AmbitError::CapabilityRedeclared(_) => ErrorClass::Configuration,
            AmbitError::PermissionDenied { .. } => ErrorClass::Permission,
            AmbitError::NotFound(_)
            | AmbitError::Storage { .. }
            | AmbitError::Decryption(_)
            | AmbitError::Io(_) => ErrorClass::Storage,
            AmbitError::Handler { .. }
            | AmbitError::Template { .. }
            | AmbitError::Server(_)
            | AmbitError::Serialization(_)
            | AmbitError::Other(_) => ErrorClass::Runtime,
        }
    }

    /// True for configuration errors, which must abort boot.
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Configuration
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AmbitError::NotFound(_))
    }

    pub fn storage(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        AmbitError::Storage {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AmbitError>;
