use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("invalid operator found: {0}")]
    InvalidOperator(String),

    #[error("invalid collection: {0}")]
    InvalidCollection(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("Hook error: {0}")]
    Hook(String),
}

impl From<std::io::Error> for ControllerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
