use crate::Result;
use crate::engine::{EngineInner, Options};
use crate::error::TplError;
use crate::helper::{Args, BlockRenderer, Helper};
use crate::tpl::ast::{AstNode, Filter};
use crate::tpl::render_context::Context;
use crate::value::Value;
use log::debug;
use std::borrow::Cow;

/// Tree-walking evaluator for one template.
///
/// `active` holds the partials currently being expanded, outermost first;
/// entering a partial already on it is a cycle.
pub(crate) struct Renderer<'r> {
    engine: &'r EngineInner,
    options: &'r Options,
    source: &'r str,
    active: &'r [String],
}

impl<'r> Renderer<'r> {
    pub(crate) fn new(
        engine: &'r EngineInner,
        options: &'r Options,
        source: &'r str,
        active: &'r [String],
    ) -> Self {
        Self {
            engine,
            options,
            source,
            active,
        }
    }

    pub(crate) fn render_root(&self, nodes: &[AstNode], root: &Value) -> Result<String> {
        let ctx = Context::new(root);
        let mut out = String::with_capacity(self.source.len());
        self.render(nodes, &ctx, &mut out)?;
        Ok(out)
    }

    pub(crate) fn render(&self, nodes: &[AstNode], ctx: &Context, out: &mut String) -> Result<()> {
        for node in nodes {
            match node {
                AstNode::Text(t) => out.push_str(t),
                AstNode::Var {
                    path,
                    args,
                    filters,
                } => {
                    let value = self.eval_var(path, args, filters, ctx)?;
                    let text = value.to_string();
                    if self.options.no_escape {
                        out.push_str(&text);
                    } else {
                        escape_html_into(&text, out);
                    }
                }
                AstNode::Block {
                    helper,
                    args,
                    children,
                } => {
                    let Some(h) = self.lookup_helper(helper)? else {
                        continue;
                    };
                    let args = resolve_args(args, ctx);
                    let scope = BlockScope {
                        renderer: self,
                        children,
                        ctx,
                        is_block: true,
                    };
                    let value = self.invoke(helper, &h, &args, &scope)?;
                    push_value(out, value);
                }
                AstNode::Partial { name, context } => {
                    self.render_partial(name, context.as_deref(), ctx, out)?;
                }
            }
        }
        Ok(())
    }

    fn eval_var<'c>(
        &self,
        path: &str,
        args: &[String],
        filters: &[Filter],
        ctx: &'c Context,
    ) -> Result<Cow<'c, Value>> {
        let mut value = if args.is_empty() {
            match ctx.lookup(path) {
                Some(v) => Cow::Borrowed(v),
                None if self.options.strict && filters.is_empty() => {
                    return Err(TplError::UnresolvedVariable(path.to_string()));
                }
                None => Cow::Owned(Value::Null),
            }
        } else {
            Cow::Owned(self.call_inline(path, resolve_args(args, ctx), ctx)?)
        };

        for filter in filters {
            if !self.engine.helpers.contains(&filter.name) && !self.options.strict {
                // Unknown filters pass the value through.
                debug!("Render: unknown filter '{}', value passed through", filter.name);
                continue;
            }
            let mut filter_args = Args::default();
            filter_args.push(value.into_owned(), None);
            for raw in &filter.args {
                filter_args.push(lookup_or_null(ctx, raw), Some(raw.as_str()));
            }
            value = Cow::Owned(self.call_inline(&filter.name, filter_args, ctx)?);
        }

        Ok(value)
    }

    /// Calls a helper outside of a block; block helpers see an empty body.
    fn call_inline(&self, name: &str, args: Args, ctx: &Context) -> Result<Value> {
        let Some(h) = self.lookup_helper(name)? else {
            return Ok(Value::Null);
        };
        let scope = BlockScope {
            renderer: self,
            children: &[],
            ctx,
            is_block: false,
        };
        self.invoke(name, &h, &args, &scope)
    }

    /// `Ok(None)` when the helper is missing and the render is not strict.
    fn lookup_helper(&self, name: &str) -> Result<Option<Helper>> {
        match self.engine.helpers.get(name) {
            Some(h) => Ok(Some(h)),
            None if self.options.strict => Err(TplError::UnknownHelper(name.to_string())),
            None => {
                debug!("Render: unknown helper '{}' rendered as empty", name);
                Ok(None)
            }
        }
    }

    fn invoke(&self, name: &str, helper: &Helper, args: &Args, scope: &BlockScope) -> Result<Value> {
        helper.call(args, scope).map_err(|e| match e {
            TplError::Helper(message) => TplError::Render {
                name: name.to_string(),
                template: self.source.to_string(),
                message,
            },
            other => other,
        })
    }

    fn render_partial(
        &self,
        name: &str,
        context_expr: Option<&str>,
        ctx: &Context,
        out: &mut String,
    ) -> Result<()> {
        let Some(partial) = self.engine.partial(name) else {
            if self.options.strict {
                return Err(TplError::UnknownPartial(name.to_string()));
            }
            debug!("Render: unknown partial '{}' rendered as empty", name);
            return Ok(());
        };

        if self.active.iter().any(|p| p == name) {
            return Err(TplError::Render {
                name: name.to_string(),
                template: self.source.to_string(),
                message: format!("partial cycle detected: {}", name),
            });
        }

        let merged = context_expr.and_then(|expr| merge_context(ctx.this(), ctx.lookup(expr)?));
        let this = merged.as_ref().unwrap_or(ctx.this());
        let scope = ctx.child(this, &[]);

        let ast = self.engine.template_ast(&partial, self.options.cache)?;
        let mut active = self.active.to_vec();
        active.push(name.to_string());
        let renderer = Renderer::new(self.engine, self.options, &partial, &active);
        renderer.render(&ast, &scope, out)
    }
}

/// Shallow-merges `over` onto `base`. Only maps merge; a non-map override leaves
/// the current context as it is.
fn merge_context(base: &Value, over: &Value) -> Option<Value> {
    match (base, over) {
        (Value::Map(base), Value::Map(over)) => {
            let mut merged = base.clone();
            merged.extend(over.iter().map(|(k, v)| (k.clone(), v.clone())));
            Some(Value::Map(merged))
        }
        (_, Value::Map(_)) => Some(over.clone()),
        _ => None,
    }
}

struct BlockScope<'s> {
    renderer: &'s Renderer<'s>,
    children: &'s [AstNode],
    ctx: &'s Context<'s>,
    is_block: bool,
}

impl BlockRenderer for BlockScope<'_> {
    fn render_children_with(&self, ctx: &Value, data: &[(&str, Value)]) -> Result<String> {
        let scope = self.ctx.child(ctx, data);
        let mut out = String::new();
        self.renderer.render(self.children, &scope, &mut out)?;
        Ok(out)
    }

    fn render_inverse(&self, _ctx: &Value) -> Result<String> {
        Ok(String::new())
    }

    fn context(&self) -> &Value {
        self.ctx.this()
    }

    fn is_block(&self) -> bool {
        self.is_block
    }
}

fn lookup_or_null(ctx: &Context, path: &str) -> Value {
    ctx.lookup(path).cloned().unwrap_or(Value::Null)
}

fn resolve_args<'a>(raw: &'a [String], ctx: &Context) -> Args<'a> {
    let mut args = Args::default();
    for r in raw {
        args.push(lookup_or_null(ctx, r), Some(r.as_str()));
    }
    args
}

fn push_value(out: &mut String, value: Value) {
    match value {
        Value::Str(s) => out.push_str(&s),
        Value::Null => {}
        other => out.push_str(&other.to_string()),
    }
}

/// Escapes `& < > " '`.
pub(crate) fn escape_html_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape_html() {
        let mut out = String::new();
        escape_html_into(r#"<a href="x">Tom & 'Jerry'</a>"#, &mut out);
        assert_eq!(
            out,
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_merge_context() {
        let base = Value::from(json!({"a": 1, "b": 2}));
        let over = Value::from(json!({"b": 3, "c": 4}));
        let merged = merge_context(&base, &over).unwrap();
        assert_eq!(merged, Value::from(json!({"a": 1, "b": 3, "c": 4})));

        assert_eq!(merge_context(&base, &Value::I64(1)), None);
        assert_eq!(merge_context(&Value::I64(1), &over), Some(over.clone()));
    }
}
