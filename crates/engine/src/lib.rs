pub mod config;
pub mod convention;
pub mod coverage;
pub mod diagnostics;
pub mod error;
pub mod synthesis;

pub use config::{DiagnosticsConfig, EngineConfig, Severity};
pub use convention::ForeignKeyIndexConvention;
pub use coverage::{covers, Shape};
pub use diagnostics::{sweep_redundant_indexes, DiagnosticEvent, DiagnosticListener, Diagnostics};
pub use error::{DiagnosticError, EngineError};
