pub mod ast;
pub mod cache;
pub(crate) mod compiled;
pub mod lexer;
pub mod parser;
mod render;
mod render_context;

pub use compiled::CompiledTemplate;
