use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("property list is empty")]
    EmptyPropertyList,

    #[error("property listed more than once: {0}")]
    DuplicateProperty(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
