use crate::descriptor::PluginDescriptor;
use crate::plugin::{Plugin, RouterEngine, TemplateEngine};
use ambit_core::{AmbitError, CoreRole, Result};
use std::sync::Arc;

/// The ordered plugin list the application hands to the host.
///
/// Three CORE slots (router, template engine, session manager) plus two
/// ordered lists. Declaration order is significant: it is the order plugins
/// are classified and bound in, and middleware order is the onion order.
#[derive(Default)]
pub struct PluginLoader {
    router: Option<Box<dyn RouterEngine>>,
    template_engine: Option<Arc<dyn TemplateEngine>>,
    session_manager: Option<Arc<dyn Plugin>>,
    plugins: Vec<Arc<dyn Plugin>>,
    middleware: Vec<Arc<dyn Plugin>>,
}

pub(crate) struct LoadedSet {
    pub router: Box<dyn RouterEngine>,
    pub templates: Arc<dyn TemplateEngine>,
    pub descriptors: Vec<PluginDescriptor>,
}

impl PluginLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn router(mut self, router: impl RouterEngine + 'static) -> Self {
        self.router = Some(Box::new(router));
        self
    }

    pub fn template_engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.template_engine = Some(engine);
        self
    }

    /// The session manager is CORE. Pass the same instance to
    /// [`PluginLoader::middleware`] to place its wrapper in the chain.
    pub fn session_manager(mut self, manager: Arc<dyn Plugin>) -> Self {
        self.session_manager = Some(manager);
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn middleware(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.middleware.push(plugin);
        self
    }

    pub fn plugin_count(&self) -> usize {
        usize::from(self.router.is_some())
            + usize::from(self.template_engine.is_some())
            + usize::from(self.session_manager.is_some())
            + self.plugins.len()
            + self.middleware.len()
    }

    /// Check the CORE slots and flatten everything into descriptors, in
    /// declaration order: router, template engine, plugins, middleware.
    pub(crate) fn into_set(self) -> Result<LoadedSet> {
        let router = self
            .router
            .ok_or(AmbitError::MissingCoreRole(CoreRole::Router))?;
        let templates = self
            .template_engine
            .ok_or(AmbitError::MissingCoreRole(CoreRole::TemplateEngine))?;
        let session = self
            .session_manager
            .ok_or(AmbitError::MissingCoreRole(CoreRole::SessionManager))?;

        let mut descriptors = vec![
            PluginDescriptor::describe(router.as_ref(), Some(CoreRole::Router)),
            PluginDescriptor::describe(templates.as_ref(), Some(CoreRole::TemplateEngine)),
        ];

        let session_in_chain = self
            .middleware
            .iter()
            .any(|p| std::ptr::addr_eq(Arc::as_ptr(p), Arc::as_ptr(&session)));
        let session_descriptor =
            PluginDescriptor::describe(session.as_ref(), Some(CoreRole::SessionManager))
                .with_handle(session.clone());
        if !session_in_chain {
            descriptors.push(session_descriptor.clone());
        }

        for plugin in self.plugins {
            descriptors.push(PluginDescriptor::describe(plugin.as_ref(), None).with_handle(plugin));
        }
        for plugin in self.middleware {
            if std::ptr::addr_eq(Arc::as_ptr(&plugin), Arc::as_ptr(&session)) {
                descriptors.push(session_descriptor.clone());
            } else {
                descriptors
                    .push(PluginDescriptor::describe(plugin.as_ref(), None).with_handle(plugin));
            }
        }

        Ok(LoadedSet {
            router,
            templates,
            descriptors,
        })
    }
}
