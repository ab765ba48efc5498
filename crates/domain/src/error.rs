use uuid::Uuid;

/// Shared error type used across all WebForge crates.
///
/// Tool *failures* are deliberately not represented here — a tool that
/// errors produces a `ToolOutcome` with `status=error`, not an `Err`.
/// Only structural failures (malformed calls, store trouble, missing
/// records) surface as errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store: {0}")]
    Store(String),

    #[error("execution {0} not found")]
    ExecutionNotFound(Uuid),

    #[error("flow record not found: {0}")]
    FlowRecordNotFound(String),

    #[error("malformed tool call: {0}")]
    MalformedCall(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
