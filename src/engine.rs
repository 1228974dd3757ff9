use std::sync::Arc;

use dashmap::DashMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::helper::{Helper, HelperRegistry};
use crate::loader;
use crate::tpl::CompiledTemplate;
use crate::tpl::ast::AstNode;
use crate::tpl::cache::{CacheStats, TemplateCache};
use crate::tpl::compiled;
use crate::value::ToValue;

/// Rendering switches. Deserializable so an application can keep them in its
/// config file; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Disables HTML escaping for every variable of the render.
    pub no_escape: bool,
    /// Unknown helpers, partials and unresolved variables become errors
    /// instead of rendering as empty.
    pub strict: bool,
    /// Looks templates up in (and stores them into) the compilation cache.
    pub cache: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            no_escape: false,
            strict: false,
            cache: true,
        }
    }
}

pub(crate) struct EngineInner {
    pub(crate) helpers: HelperRegistry,
    partials: DashMap<String, String>,
    cache: TemplateCache,
    options: Options,
}

impl EngineInner {
    pub(crate) fn partial(&self, name: &str) -> Option<String> {
        self.partials.get(name).map(|p| p.value().clone())
    }

    pub(crate) fn template_ast(&self, source: &str, use_cache: bool) -> Result<Arc<Vec<AstNode>>> {
        if use_cache {
            self.cache.get_or_compile(source)
        } else {
            Ok(Arc::new(compiled::compile_source(source)?))
        }
    }
}

/// A template engine owning its helpers, partials and compilation cache.
///
/// Engines are independent of each other; clones share the same state. All
/// registries are concurrent maps, so an engine can be shared across threads
/// and extended while other threads render.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Creates an engine with default options and the built-in helpers.
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                helpers: HelperRegistry::with_builtins(),
                partials: DashMap::new(),
                cache: TemplateCache::new(),
                options,
            }),
        }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Options used by `compile` and `render`.
    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Compiles `source` with the engine options.
    ///
    /// # Errors
    /// `TplError::Compile` when a block is never closed.
    pub fn compile(&self, source: &str) -> Result<CompiledTemplate> {
        self.compile_with(source, &self.inner.options)
    }

    /// Compiles `source` with per-call options. With `options.cache` off the
    /// cache is neither consulted nor populated.
    pub fn compile_with(&self, source: &str, options: &Options) -> Result<CompiledTemplate> {
        let ast = self.inner.template_ast(source, options.cache)?;
        Ok(CompiledTemplate::new(
            ast,
            source,
            options.clone(),
            self.inner.clone(),
        ))
    }

    /// Compiles (or fetches from the cache) and renders in one step.
    pub fn render<T: ToValue + ?Sized>(&self, source: &str, ctx: &T) -> Result<String> {
        self.compile(source)?.render(ctx)
    }

    pub fn render_with<T: ToValue + ?Sized>(
        &self,
        source: &str,
        ctx: &T,
        options: &Options,
    ) -> Result<String> {
        self.compile_with(source, options)?.render(ctx)
    }

    /// Registers a helper, replacing any helper with the same name.
    pub fn register_helper(&self, name: impl Into<String>, helper: Helper) {
        self.inner.helpers.register(name, helper);
    }

    pub fn register_helpers<I, K>(&self, helpers: I)
    where
        I: IntoIterator<Item = (K, Helper)>,
        K: Into<String>,
    {
        for (name, helper) in helpers {
            self.register_helper(name, helper);
        }
    }

    pub fn has_helper(&self, name: &str) -> bool {
        self.inner.helpers.contains(name)
    }

    /// Registers a partial, replacing any partial with the same name.
    pub fn register_partial(&self, name: impl Into<String>, source: impl Into<String>) {
        self.inner.partials.insert(name.into(), source.into());
    }

    pub fn register_partials<I, K, V>(&self, partials: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, source) in partials {
            self.register_partial(name, source);
        }
    }

    pub fn has_partial(&self, name: &str) -> bool {
        self.inner.partials.contains_key(name)
    }

    /// Registers every file matching a glob pattern as a partial named after
    /// its file stem (`partials/header.hbs` -> `header`).
    ///
    /// # Arguments
    /// * `pattern` - A glob pattern, e.g. "templates/partials/*.hbs".
    ///
    /// # Returns
    /// The number of partials registered.
    pub fn load_partials(&self, pattern: &str) -> Result<usize> {
        let partials = loader::load(pattern)?;
        let count = partials.len();
        self.register_partials(partials);
        Ok(count)
    }

    /// Registers `(path, content)` pairs, typically produced by
    /// `partial_assets!`, naming each partial after the file stem.
    pub fn register_partial_assets(&self, assets: Vec<(&str, &str)>) -> Result<usize> {
        let partials = loader::load_assets(assets)?;
        let count = partials.len();
        self.register_partials(partials);
        Ok(count)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Drops every compiled template. Compiled templates already handed out
    /// stay usable.
    pub fn clear_cache(&self) {
        debug!("Template cache cleared: size={}", self.inner.cache.len());
        self.inner.cache.clear();
    }
}

/// Chained construction of an [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    options: Options,
    helpers: Vec<(String, Helper)>,
    partials: Vec<(String, String)>,
}

impl EngineBuilder {
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn no_escape(mut self, no_escape: bool) -> Self {
        self.options.no_escape = no_escape;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    pub fn cache(mut self, cache: bool) -> Self {
        self.options.cache = cache;
        self
    }

    pub fn helper(mut self, name: impl Into<String>, helper: Helper) -> Self {
        self.helpers.push((name.into(), helper));
        self
    }

    pub fn partial(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.partials.push((name.into(), source.into()));
        self
    }

    pub fn build(self) -> Engine {
        let engine = Engine::with_options(self.options);
        engine.register_helpers(self.helpers);
        engine.register_partials(self.partials);
        engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use serde_json::json;

    #[test]
    fn test_options_from_config() {
        let options: Options = serde_json::from_value(json!({"noEscape": true})).unwrap();
        assert_eq!(
            options,
            Options {
                no_escape: true,
                strict: false,
                cache: true,
            }
        );
    }

    #[test]
    fn test_builder() {
        let engine = Engine::builder()
            .strict(true)
            .helper("shout", Helper::inline(|args| {
                Ok(Value::Str(format!("{}!", args.get(0))))
            }))
            .partial("sig", "-- {{name}}")
            .build();

        assert!(engine.options().strict);
        assert!(engine.has_helper("shout"));
        assert!(engine.has_helper("each"));
        assert!(engine.has_partial("sig"));
        let out = engine
            .render("{{shout name}} {{> sig}}", &json!({"name": "Ada"}))
            .unwrap();
        assert_eq!(out, "Ada! -- Ada");
    }

    #[test]
    fn test_engines_are_independent() {
        let a = Engine::new();
        let b = Engine::new();
        a.register_partial("p", "from a");
        a.render("x", &()).unwrap();

        assert!(!b.has_partial("p"));
        assert_eq!(b.cache_stats().size, 0);
        assert_eq!(a.cache_stats().size, 1);
    }

    #[test]
    fn test_clones_share_state() {
        let a = Engine::new();
        let b = a.clone();
        b.register_partial("p", "shared");
        assert_eq!(a.render("{{> p}}", &()).unwrap(), "shared");
    }

    #[test]
    fn test_compile_without_cache() {
        let engine = Engine::new();
        let options = Options {
            cache: false,
            ..Options::default()
        };
        let tpl = engine.compile_with("{{a}}", &options).unwrap();
        assert_eq!(tpl.render(&json!({"a": 1})).unwrap(), "1");
        assert_eq!(engine.cache_stats().size, 0);
    }
}
