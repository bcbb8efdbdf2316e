//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty after normalization.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Invalid classification value.
    #[error("invalid classification: {value}")]
    InvalidClassification { value: String },
}

/// How time spent on a domain is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Productive,
    Unproductive,
    Neutral,
}

impl Classification {
    /// String representation for storage and display.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Productive => "productive",
            Self::Unproductive => "unproductive",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Classification {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "productive" => Ok(Self::Productive),
            "unproductive" => Ok(Self::Unproductive),
            "neutral" => Ok(Self::Neutral),
            _ => Err(ValidationError::InvalidClassification {
                value: s.to_string(),
            }),
        }
    }
}

/// Generates a validated string newtype with common trait implementations.
///
/// The normalizer runs before the emptiness check, so whitespace-only input
/// is rejected as empty.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal, $normalize:expr
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new value after normalization and validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let normalize: fn(&str) -> String = $normalize;
                let id = normalize(&id.into());
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated internet domain (host name).
    ///
    /// Domains are lower-cased and stripped of surrounding whitespace and a
    /// trailing root dot, so `GitHub.com.` and `github.com` are the same key.
    Domain, "domain", |s| s.trim().trim_end_matches('.').to_ascii_lowercase()
);

define_string_id!(
    /// An opaque token identifying the remote account buckets belong to.
    Identity, "identity", |s| s.trim().to_string()
);
