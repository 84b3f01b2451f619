use ambit_core::{AmbitError, Result};
use ambit_plugin::{Embedded, Plugin, TemplateAssets, TemplateEngine, Vars, escape_html};
use rust_embed::RustEmbed;
use serde_json::Value;

#[derive(RustEmbed)]
#[folder = "templates/"]
struct LayoutAssets;

/// The CORE template engine.
///
/// Pages are `<page>.html` files from the calling plugin's assets.
/// `{{ key }}` inserts an escaped variable, `{{{ key }}}` inserts it raw.
/// Fragments are wrapped in the shared layout; a page that starts with a
/// doctype is served as-is.
pub struct HtmlEngine {
    layout: Embedded<LayoutAssets>,
}

impl HtmlEngine {
    pub fn new() -> Self {
        Self {
            layout: Embedded::new(),
        }
    }
}

impl Default for HtmlEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn load(assets: &dyn TemplateAssets, page: &str) -> Result<String> {
    let file = format!("{page}.html");
    let bytes = assets.get(&file).ok_or_else(|| AmbitError::Template {
        page: page.to_string(),
        reason: format!("{file} not found"),
    })?;
    String::from_utf8(bytes.into_owned()).map_err(|_| AmbitError::Template {
        page: page.to_string(),
        reason: "template is not UTF-8".into(),
    })
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn substitute(template: &str, vars: &Vars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let tag = &rest[start..];
        let (open, close, raw) = if tag.starts_with("{{{") {
            (3, "}}}", true)
        } else {
            (2, "}}", false)
        };
        let Some(end) = tag[open..].find(close) else {
            out.push_str(tag);
            return out;
        };
        let key = tag[open..open + end].trim();
        let value = vars.get(key).map(value_text).unwrap_or_default();
        if raw {
            out.push_str(&value);
        } else {
            out.push_str(&escape_html(&value));
        }
        rest = &tag[open + end + close.len()..];
    }
    out.push_str(rest);
    out
}

impl Plugin for HtmlEngine {
    fn name(&self) -> &str {
        "html"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }
}

impl TemplateEngine for HtmlEngine {
    fn render(&self, assets: &dyn TemplateAssets, page: &str, vars: &Vars) -> Result<String> {
        let body = substitute(&load(assets, page)?, vars);
        if body.trim_start().to_ascii_lowercase().starts_with("<!doctype") {
            return Ok(body);
        }
        let mut outer = vars.clone();
        outer.insert("content".into(), Value::String(body));
        Ok(substitute(&load(&self.layout, "layout")?, &outer))
    }
}
