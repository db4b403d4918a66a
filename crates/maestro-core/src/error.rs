use thiserror::Error;

/// A convenience `Result` alias using [`MaestroError`].
pub type MaestroResult<T> = Result<T, MaestroError>;

/// Top-level error type for maestro.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Error, Debug)]
pub enum MaestroError {
    /// An agent failed while handling a task or a message.
    #[error("Agent error: {0}")]
    Agent(String),

    /// A caller passed input that violates a precondition (e.g. an empty task id).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from the workflow orchestrator itself.
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// An operation did not finish within its time bound.
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MaestroError::InvalidArgument("task id must not be empty".into());
        assert_eq!(
            err.to_string(),
            "Invalid argument: task id must not be empty"
        );
        assert_eq!(
            MaestroError::Timeout("t1-review".into()).to_string(),
            "Timeout: t1-review"
        );
    }

    #[test]
    fn test_from_json_error() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: MaestroError = parse.unwrap_err().into();
        assert!(matches!(err, MaestroError::Serialization(_)));
    }
}
