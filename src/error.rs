use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by workspace file operations. Every variant carries enough
/// detail that the message can be shown to the user as-is.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no file path was given")]
    InvalidPath,

    #[error("path '{path}' points outside the open project folder")]
    OutsideWorkspace { path: String },

    #[error("content is {size} bytes, larger than the {limit} byte limit")]
    ContentTooLarge { size: usize, limit: usize },

    #[error("'{path}' is a protected system path and will not be touched")]
    SystemFileBlocked { path: String },

    #[error("'{}' is not writable", path.display())]
    NotWritable { path: PathBuf },

    #[error("'{}' does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("the code block is empty, nothing to write")]
    EmptyContent,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Failures from the model API, classified so each one maps to a distinct
/// message the user can act on.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("the API key was rejected or missing")]
    InvalidCredential,

    #[error("the model is unavailable: {0}")]
    ModelUnavailable(String),

    #[error("the model request failed: {0}")]
    Failed(String),
}

impl ModelError {
    /// Message shown in the chat transcript when a model call fails.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredential => {
                "Your API key was rejected or is missing. Set the OPENAI_API_KEY environment \
                 variable and try again."
                    .to_string()
            }
            Self::ModelUnavailable(detail) => {
                format!(
                    "The model is unavailable right now ({detail}). Try again in a moment or \
                     switch to another model in the config."
                )
            }
            Self::Failed(detail) => format!("The request to the model failed: {detail}"),
        }
    }
}
