//! # ambit-core
//!
//! Core types and primitives for the Ambit plugin host. This crate defines the
//! shared vocabulary used by every other crate in the workspace: the closed set
//! of grantable capabilities, the trust tiers a plugin can be assigned, and the
//! unified error type.

pub mod error;
pub mod grant;
pub mod types;

pub use error::{AmbitError, ErrorClass, Result};
pub use grant::{GrantKind, GrantRequest};
pub use types::{CoreRole, TrustTier};
