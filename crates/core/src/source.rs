use serde::{Deserialize, Serialize};

/// Precedence of a piece of configuration. Later variants outrank earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfigurationSource {
    Convention,
    DataAnnotation,
    Explicit,
}

impl ConfigurationSource {
    /// Whether a request made at `self` may replace configuration made at `existing`.
    pub fn overrides(self, existing: Self) -> bool {
        self >= existing
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Convention => "convention",
            Self::DataAnnotation => "data_annotation",
            Self::Explicit => "explicit",
        }
    }
}

/// Result of a mutation request against the schema graph.
///
/// Neither rejection is an error: callers that only care whether something
/// changed use [`Outcome::applied`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T> {
    Applied(T),
    /// The target carries configuration from a higher source.
    RejectedPrecedence,
    /// The request referenced something that does not exist or would break the graph.
    RejectedInvalid,
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::RejectedPrecedence | Self::RejectedInvalid => None,
        }
    }
}
