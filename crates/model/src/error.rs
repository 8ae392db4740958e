use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("core error: {0}")]
    Core(#[from] indexkeeper_core::CoreError),

    #[error("entity type not found: {0}")]
    EntityTypeNotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
