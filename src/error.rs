use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TplError {
    /// A block start tag without its matching end tag.
    #[error("Compile Error: {message} (offset {offset})")]
    Compile {
        helper: String,
        offset: usize,
        message: String,
    },
    /// A helper failed or a partial could not be expanded while rendering.
    #[error("Render Error in '{name}': {message}")]
    Render {
        name: String,
        template: String,
        message: String,
    },
    #[error("Unknown Helper: {0}")]
    UnknownHelper(String),
    #[error("Unknown Partial: {0}")]
    UnknownPartial(String),
    #[error("Unresolved Variable: {0}")]
    UnresolvedVariable(String),
    /// Raised from inside helper bodies; the renderer wraps it into `Render`.
    #[error("Helper Error: {0}")]
    Helper(String),
    #[error("Serialization Error: {0}")]
    Serialization(String),
    #[error("Template Io Error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Partial Load Error: {0}")]
    Loader(String),
}

impl TplError {
    pub fn helper(msg: impl Into<String>) -> Self {
        TplError::Helper(msg.into())
    }

    pub(crate) fn unclosed_block(helper: &str, offset: usize) -> Self {
        TplError::Compile {
            helper: helper.to_string(),
            offset,
            message: format!("unclosed block: {}", helper),
        }
    }
}

impl serde::ser::Error for TplError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        TplError::Serialization(msg.to_string())
    }
}
