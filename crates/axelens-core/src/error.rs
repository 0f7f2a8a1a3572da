use thiserror::Error;

#[derive(Debug, Error)]
pub enum AxeLensError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Audit error: {0}")]
    Audit(String),

    #[error("Panel error: {0}")]
    Panel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AxeLensError>;
