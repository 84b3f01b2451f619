use rust_embed::RustEmbed;
use std::borrow::Cow;
use std::marker::PhantomData;

/// Template variables.
pub type Vars = serde_json::Map<String, serde_json::Value>;

/// A named set of templates, usually embedded in the plugin binary.
pub trait TemplateAssets: Send + Sync {
    fn get(&self, name: &str) -> Option<Cow<'static, [u8]>>;
}

/// [`TemplateAssets`] backed by a `rust-embed` folder.
pub struct Embedded<E: RustEmbed>(PhantomData<fn() -> E>);

impl<E: RustEmbed> Embedded<E> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<E: RustEmbed> Default for Embedded<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: RustEmbed> TemplateAssets for Embedded<E> {
    fn get(&self, name: &str) -> Option<Cow<'static, [u8]>> {
        E::get(name).map(|file| file.data)
    }
}

/// Minimal HTML escaping for text and attribute values.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
