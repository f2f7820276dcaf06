use thiserror::Error;

/// Possible errors from probing the target repository before or during an
/// import.
#[derive(Debug, Error)]
pub enum Error {
    #[error("error spawning {command}: {err}")]
    Spawn {
        command: String,
        err: std::io::Error,
    },

    #[error("{command} exited with a non-zero status: {code:?}")]
    ExitStatus { command: String, code: Option<i32> },

    #[error("unexpected output from {command}: {reason}")]
    UnexpectedOutput { command: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
