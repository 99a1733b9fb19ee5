//! Error type shared by all MechaHelper crates.

/// Errors surfaced by the config, store and transport layers.
#[derive(Debug, thiserror::Error)]
pub enum MechaError {
    #[error("Config error: {0}")]
    Config(String),

    /// Persisted state could not be written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The chat transport rejected or failed a request.
    #[error("Channel error: {0}")]
    Channel(String),

    /// Neither text nor an attachment was supplied for an assignment.
    #[error("Assignment has no text and no attachment")]
    EmptyAssignment,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MechaError>;
