use tether_core::MarshalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error("script engine error: {0}")]
    Engine(#[from] rquickjs::Error),

    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),

    #[error("no retained object for handle {0}")]
    UnknownHandle(u32),
}

impl ScriptError {
    /// The marshalling error, if this is one.
    pub fn as_marshal(&self) -> Option<&MarshalError> {
        match self {
            ScriptError::Marshal(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T, E = ScriptError> = std::result::Result<T, E>;
