use thiserror::Error;

/// Result type alias using [`TattleError`].
pub type Result<T> = std::result::Result<T, TattleError>;

#[derive(Debug, Error)]
pub enum TattleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Querying or changing the local terminal's parameters failed.
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Pseudo-terminal allocation or shell spawn failed.
    #[error("Unable to create a pseudo-terminal: {0}")]
    Pty(String),

    #[error("Unable to create thread {name}: {source}")]
    Thread {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Collector request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Collector rejected batch ({status})")]
    Collector { status: u16 },
}

impl TattleError {
    /// Wrap an error coming out of portable-pty.
    pub fn pty(err: impl std::fmt::Display) -> Self {
        Self::Pty(err.to_string())
    }
}
