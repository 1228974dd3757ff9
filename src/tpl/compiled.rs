use crate::Result;
use crate::engine::{EngineInner, Options};
use crate::tpl::ast::AstNode;
use crate::tpl::render::Renderer;
use crate::tpl::{lexer, parser};
use crate::value::{ToValue, Value};
use log::debug;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Lexes and parses a template source into its AST.
pub(crate) fn compile_source(source: &str) -> Result<Vec<AstNode>> {
    let start = Instant::now();
    let tokens = lexer::tokenize(source);
    let result = parser::parse(&tokens);
    let elapsed = start.elapsed().as_micros();

    match &result {
        Ok(ast) => debug!(
            "Compile: bytes={}, tokens={}, nodes={}, elapsed={}us",
            source.len(),
            tokens.len(),
            ast.len(),
            elapsed
        ),
        Err(e) => debug!(
            "Compile: bytes={}, tokens={}, elapsed={}us, error={}",
            source.len(),
            tokens.len(),
            elapsed,
            e
        ),
    }

    result
}

/// A compiled template bound to the engine that produced it.
///
/// Rendering consults the engine's current helpers and partials, so helpers
/// registered after compilation are visible. Cloning is cheap.
#[derive(Clone)]
pub struct CompiledTemplate {
    ast: Arc<Vec<AstNode>>,
    source: Arc<str>,
    options: Options,
    engine: Arc<EngineInner>,
}

impl CompiledTemplate {
    pub(crate) fn new(
        ast: Arc<Vec<AstNode>>,
        source: &str,
        options: Options,
        engine: Arc<EngineInner>,
    ) -> Self {
        Self {
            ast,
            source: Arc::from(source),
            options,
            engine,
        }
    }

    /// Renders the template against `ctx`.
    pub fn render<T: ToValue + ?Sized>(&self, ctx: &T) -> Result<String> {
        let value = ctx.to_value();
        self.render_value(&value)
    }

    /// Renders the template against an already built `Value`, without copying it.
    pub fn render_value(&self, ctx: &Value) -> Result<String> {
        Renderer::new(&self.engine, &self.options, &self.source, &[]).render_root(&self.ast, ctx)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("source", &self.source)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TplError;

    #[test]
    fn test_compile_source() {
        let ast = compile_source("Hi {{name}}{{!-- note --}}!").unwrap();
        assert_eq!(ast.len(), 3);
    }

    #[test]
    fn test_compile_source_reports_helper() {
        let err = compile_source("{{#each items}}{{this}}").unwrap_err();
        match err {
            TplError::Compile { helper, .. } => assert_eq!(helper, "each"),
            other => panic!("Expected Compile error, got {:?}", other),
        }
    }
}
