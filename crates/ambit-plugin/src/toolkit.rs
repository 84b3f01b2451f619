use crate::grants::{GrantTable, PluginRecord};
use crate::plugin::TemplateEngine;
use crate::template::{TemplateAssets, Vars};
use ambit_config::Environment;
use ambit_core::{AmbitError, GrantKind, Result};
use ambit_storage::SiteStore;
use axum::response::{Html, IntoResponse, Response};
use std::sync::Arc;
use tracing::warn;

/// Host services handed to one plugin, bound to that plugin's name.
///
/// Every gated call checks the grant table first and returns
/// [`AmbitError::PermissionDenied`] when the plugin lacks the grant.
#[derive(Clone)]
pub struct Toolkit {
    plugin: String,
    grants: Arc<GrantTable>,
    templates: Arc<dyn TemplateEngine>,
    site: Option<Arc<SiteStore>>,
    env: Arc<Environment>,
}

impl Toolkit {
    pub fn new(
        plugin: &str,
        grants: Arc<GrantTable>,
        templates: Arc<dyn TemplateEngine>,
        site: Option<Arc<SiteStore>>,
        env: Arc<Environment>,
    ) -> Self {
        Self {
            plugin: plugin.to_string(),
            grants,
            templates,
            site,
            env,
        }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn is_approved(&self, kind: GrantKind) -> bool {
        self.grants.is_approved(&self.plugin, kind)
    }

    fn require(&self, kind: GrantKind) -> Result<()> {
        if self.is_approved(kind) {
            return Ok(());
        }
        warn!(plugin = %self.plugin, grant = %kind, "capability use denied");
        Err(AmbitError::PermissionDenied {
            plugin: self.plugin.clone(),
            grant: kind,
        })
    }

    pub fn render_page(&self, assets: &dyn TemplateAssets, page: &str, vars: &Vars) -> Result<String> {
        self.templates.render(assets, page, vars)
    }

    /// Render `page` as a `text/html` response.
    pub fn render(&self, assets: &dyn TemplateAssets, page: &str, vars: &Vars) -> Result<Response> {
        Ok(Html(self.render_page(assets, page, vars)?).into_response())
    }

    fn site(&self) -> Result<&SiteStore> {
        self.site
            .as_deref()
            .ok_or_else(|| AmbitError::storage("site", "site storage is not configured"))
    }

    /// Read a value from this plugin's site namespace.
    pub fn site_get(&self, key: &str) -> Result<Option<String>> {
        self.require(GrantKind::SiteStorageRead)?;
        Ok(self.site()?.get(&self.plugin, key))
    }

    pub async fn site_put(&self, key: &str, value: &str) -> Result<()> {
        self.require(GrantKind::SiteStorageWrite)?;
        self.site()?.put(&self.plugin, key, value).await
    }

    pub fn env(&self, key: &str) -> Result<Option<String>> {
        self.require(GrantKind::EnvironmentRead)?;
        Ok(self.env.get(key).map(str::to_string))
    }

    /// Every loaded plugin with its tier and grants, in declaration order.
    pub fn plugins(&self) -> Result<Vec<PluginRecord>> {
        self.require(GrantKind::SitePluginRead)?;
        Ok(self.grants.records().to_vec())
    }
}

impl std::fmt::Debug for Toolkit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolkit").field("plugin", &self.plugin).finish()
    }
}
