//! View resolution and rendering.
//!
//! Views are runtime files resolved as
//! `<view_dir>/<Ucfirst(name)>View.<ext>` and loaded only through the
//! allow-list loader — there is no bypass path. Rendering goes through
//! minijinja with HTML autoescape; values a controller wants emitted
//! raw must be exported with [`TemplateScope::insert_safe`].

use crate::config::FrameworkConfig;
use crate::error::FrameworkError;
use crate::helpers::ucfirst;
use crate::loader::SafeLoader;
use minijinja::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Variable set exported to a rendered template.
///
/// Two scopes feed a render: the controller's exported context and the
/// action-supplied set; merging is last-write-wins, so action values
/// override controller values of the same name.
#[derive(Debug, Clone, Default)]
pub struct TemplateScope {
    vars: BTreeMap<String, Value>,
}

impl TemplateScope {
    /// Empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Export a value under `key`. Rendered with autoescaping.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) {
        self.vars.insert(key.into(), Value::from_serialize(&value));
    }

    /// Export pre-escaped HTML under `key`, rendered without further
    /// escaping.
    pub fn insert_safe(&mut self, key: impl Into<String>, html: impl Into<String>) {
        self.vars.insert(key.into(), Value::from_safe_string(html.into()));
    }

    /// Read back an exported value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    /// Overlay another scope onto this one; `other` wins on key clashes.
    pub fn merge(&mut self, other: Self) {
        self.vars.extend(other.vars);
    }

    /// Number of exported variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether nothing is exported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub(crate) const fn context(&self) -> &BTreeMap<String, Value> {
        &self.vars
    }
}

/// Renders view templates resolved through the allow-list loader.
#[derive(Debug)]
pub struct ViewRenderer {
    config: Arc<FrameworkConfig>,
    loader: Arc<SafeLoader>,
}

impl ViewRenderer {
    /// Build a renderer over the loader.
    #[must_use]
    pub const fn new(config: Arc<FrameworkConfig>, loader: Arc<SafeLoader>) -> Self {
        Self { config, loader }
    }

    /// Render the named view with the given variable scope.
    ///
    /// # Errors
    ///
    /// Propagates the loader's denial for unauthorized or absent view
    /// files, and [`FrameworkError::Template`] for render failures —
    /// never raw engine output.
    pub fn render(&self, view_name: &str, scope: &TemplateScope) -> Result<String, FrameworkError> {
        let symbol = format!("{}View", ucfirst(view_name));
        let loaded = self.loader.resolve_and_load(&symbol)?;

        let template_name = format!("{symbol}.{}", self.config.resource_ext);
        let mut env = minijinja::Environment::new();
        env.add_template_owned(template_name.clone(), loaded.source.to_string())?;
        let html = env.get_template(&template_name)?.render(scope.context())?;
        Ok(html)
    }
}
