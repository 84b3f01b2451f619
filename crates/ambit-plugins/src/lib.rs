//! # ambit-plugins
//!
//! The plugins shipped with Ambit: a few dashboard pages, operator sign-in,
//! and the middleware a typical deployment stacks in front of the router.

pub mod envinfo;
pub mod hello;
pub mod login;
pub mod middleware;
pub mod navigation;
pub mod pluginmanager;

pub use envinfo::EnvInfo;
pub use hello::Hello;
pub use login::{Login, hash_password, verify_password};
pub use navigation::Navigation;
pub use pluginmanager::PluginManager;
