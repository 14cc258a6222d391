/// Shared error type used across all halo crates.
///
/// Structured, expected failures (scope not found, remote delete failed,
/// config validation issues) are modeled as plain data returned from the
/// relevant operation, not as `Error` variants — see each module's result
/// type. This enum is reserved for conditions that are genuinely
/// exceptional: I/O failure, malformed JSON, a config file that cannot be
/// parsed at all.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("remote: {0}")]
    Remote(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
