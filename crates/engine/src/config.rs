use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Minimum severity a diagnostic needs before it is written to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    /// Nothing is logged.
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub min_severity: Severity,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            min_severity: Severity::Info,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub diagnostics: DiagnosticsConfig,
}

impl EngineConfig {
    /// Configuration with diagnostics logging switched off.
    pub fn quiet() -> Self {
        Self {
            diagnostics: DiagnosticsConfig {
                min_severity: Severity::Off,
            },
        }
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, EngineError> {
        rmp_serde::to_vec_named(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, EngineError> {
        rmp_serde::from_slice(bytes).map_err(|e| EngineError::Config(e.to_string()))
    }
}
