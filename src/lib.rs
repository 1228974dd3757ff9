//! # ubars
//!
//! A small Handlebars-style template engine. Templates are compiled once into
//! a cached AST and rendered against a dynamic [`Value`] context.
//!
//! ```rust
//! use ubars::Engine;
//! use serde_json::json;
//!
//! let engine = Engine::new();
//! engine.register_partial("item", "<li>{{name}}</li>");
//! let html = engine
//!     .render(
//!         "<ul>{{#each items}}{{> item}}{{/each}}</ul>",
//!         &json!({"items": [{"name": "a"}, {"name": "b"}]}),
//!     )
//!     .unwrap();
//! assert_eq!(html, "<ul><li>a</li><li>b</li></ul>");
//! ```

pub mod engine;
pub mod error;
pub mod helper;
mod loader;
pub mod tpl;
pub mod value;

pub use engine::{Engine, EngineBuilder, Options};
pub use error::TplError;
pub use helper::{Args, BlockRenderer, Helper};
pub use tpl::CompiledTemplate;
pub use tpl::cache::CacheStats;
pub use value::{ToValue, Value};

pub use ubars_macros::ToValue;
pub use ubars_macros::partial_assets;

pub type Result<T> = std::result::Result<T, TplError>;
