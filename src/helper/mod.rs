mod builtin;

use crate::Result;
use crate::value::Value;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

static NULL: Value = Value::Null;

/// Rendering callbacks handed to block helpers.
pub trait BlockRenderer {
    /// Renders the block body with `ctx` as `this`.
    fn render_children(&self, ctx: &Value) -> Result<String> {
        self.render_children_with(ctx, &[])
    }

    /// Renders the block body with `ctx` as `this` and extra `@` data
    /// (`("index", 0)` is reachable as `{{@index}}`).
    fn render_children_with(&self, ctx: &Value, data: &[(&str, Value)]) -> Result<String>;

    /// Renders the `else` branch. Templates have no `{{else}}` syntax, so this is always empty.
    fn render_inverse(&self, ctx: &Value) -> Result<String>;

    /// The context the block appears in.
    fn context(&self) -> &Value;

    /// `false` when the helper is called inline (`{{name a}}` or as a filter).
    fn is_block(&self) -> bool;
}

pub type InlineFn = dyn Fn(&Args) -> Result<Value> + Send + Sync;
pub type BlockFn = dyn Fn(&Args, &dyn BlockRenderer) -> Result<Value> + Send + Sync;

/// A named function callable from templates.
#[derive(Clone)]
pub enum Helper {
    /// `(args) -> value`; used as `{{name a b}}`, `{{v | name a}}` or a block
    /// whose body is ignored.
    Inline(Arc<InlineFn>),
    /// `(args, renderer) -> value`; drives its own body through the renderer.
    Block(Arc<BlockFn>),
}

impl Helper {
    pub fn inline<F>(f: F) -> Self
    where
        F: Fn(&Args) -> Result<Value> + Send + Sync + 'static,
    {
        Helper::Inline(Arc::new(f))
    }

    pub fn block<F>(f: F) -> Self
    where
        F: Fn(&Args, &dyn BlockRenderer) -> Result<Value> + Send + Sync + 'static,
    {
        Helper::Block(Arc::new(f))
    }

    pub fn call(&self, args: &Args, renderer: &dyn BlockRenderer) -> Result<Value> {
        match self {
            Helper::Inline(f) => f(args),
            Helper::Block(f) => f(args, renderer),
        }
    }
}

impl fmt::Debug for Helper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Helper::Inline(_) => f.write_str("Helper::Inline"),
            Helper::Block(_) => f.write_str("Helper::Block"),
        }
    }
}

/// Positional helper arguments.
///
/// Every template argument is resolved as a context path; `raw` keeps the
/// argument text as written, so a helper may read `10` or `%Y-%m-%d` literally
/// when the path does not resolve. Filter calls have no raw text for the piped
/// value in position 0.
#[derive(Debug, Default)]
pub struct Args<'a> {
    values: Vec<Value>,
    raw: Vec<Option<&'a str>>,
}

impl<'a> Args<'a> {
    pub fn new(values: Vec<Value>) -> Self {
        let raw = vec![None; values.len()];
        Self { values, raw }
    }

    pub(crate) fn push(&mut self, value: Value, raw: Option<&'a str>) {
        self.values.push(value);
        self.raw.push(raw);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Resolved value at `idx`; `Null` when absent or unresolved.
    pub fn get(&self, idx: usize) -> &Value {
        self.values.get(idx).unwrap_or(&NULL)
    }

    pub fn raw(&self, idx: usize) -> Option<&'a str> {
        self.raw.get(idx).copied().flatten()
    }

    /// The resolved value, or the raw text as a string when it did not resolve.
    pub fn value_or_raw(&self, idx: usize) -> Option<Value> {
        match self.values.get(idx) {
            Some(v) if !v.is_null() => Some(v.clone()),
            _ => self.raw(idx).map(|s| Value::Str(s.to_string())),
        }
    }

    pub fn number(&self, idx: usize) -> Option<f64> {
        self.get(idx)
            .as_f64()
            .or_else(|| self.raw(idx).and_then(|s| s.parse::<f64>().ok()))
    }

    pub fn text(&self, idx: usize) -> Option<String> {
        self.value_or_raw(idx).map(|v| v.to_string())
    }
}

/// Named helpers owned by one engine.
pub struct HelperRegistry {
    helpers: DashMap<String, Helper>,
}

impl Default for HelperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HelperRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            helpers: DashMap::new(),
        }
    }

    /// A registry preloaded with the built-in helpers.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        builtin::register_builtins(&registry);
        registry
    }

    /// Registers `helper`, replacing any helper with the same name.
    pub fn register(&self, name: impl Into<String>, helper: Helper) {
        self.helpers.insert(name.into(), helper);
    }

    /// Returns a clone so that no map guard is held while the helper runs.
    pub fn get(&self, name: &str) -> Option<Helper> {
        self.helpers.get(name).map(|h| h.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoBody;

    impl BlockRenderer for NoBody {
        fn render_children_with(&self, _ctx: &Value, _data: &[(&str, Value)]) -> Result<String> {
            Ok(String::new())
        }
        fn render_inverse(&self, _ctx: &Value) -> Result<String> {
            Ok(String::new())
        }
        fn context(&self) -> &Value {
            &NULL
        }
        fn is_block(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_register_overwrites() {
        let registry = HelperRegistry::new();
        registry.register("greet", Helper::inline(|_| Ok(Value::Str("a".to_string()))));
        registry.register("greet", Helper::inline(|_| Ok(Value::Str("b".to_string()))));
        assert_eq!(registry.len(), 1);

        let helper = registry.get("greet").unwrap();
        let out = helper.call(&Args::default(), &NoBody).unwrap();
        assert_eq!(out, Value::Str("b".to_string()));
    }

    #[test]
    fn test_args_raw_fallback() {
        let mut args = Args::default();
        args.push(Value::Null, Some("10"));
        args.push(Value::I64(3), Some("count"));
        args.push(Value::Null, Some("%Y"));

        assert_eq!(args.number(0), Some(10.0));
        assert_eq!(args.number(1), Some(3.0));
        assert_eq!(args.text(2).as_deref(), Some("%Y"));
        assert_eq!(args.get(9), &Value::Null);
        assert_eq!(args.raw(9), None);
    }

    #[test]
    fn test_builtins_present() {
        let registry = HelperRegistry::with_builtins();
        for name in ["if", "unless", "each", "eq", "truncate", "json", "join", "add", "default", "colorize", "progress"] {
            assert!(registry.contains(name), "missing builtin {}", name);
        }
    }
}
