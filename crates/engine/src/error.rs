use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Failure reported by a diagnostics listener. Never escapes the sweep.
#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("diagnostic listener unavailable: {0}")]
    ListenerUnavailable(String),
}
