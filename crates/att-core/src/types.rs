//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The punch kind string is not one the device feed emits.
    #[error("unknown punch kind: {value}")]
    UnknownPunchKind { value: String },

    /// Invalid punch source value.
    #[error("invalid punch source: {value}")]
    UnknownPunchSource { value: String },
}

/// Where a punch came from.
///
/// Device punches are the raw clock feed; manual punches are operator
/// corrections appended after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PunchSource {
    /// Recorded by a clock device.
    #[default]
    Device,
    /// Appended by an operator through a manual correction.
    Manual,
}

impl PunchSource {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for PunchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PunchSource {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "device" => Ok(Self::Device),
            "manual" => Ok(Self::Manual),
            _ => Err(ValidationError::UnknownPunchSource {
                value: s.to_string(),
            }),
        }
    }
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
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
    /// An opaque employee identifier.
    ///
    /// The engine never resolves it to display metadata; that is the
    /// store's job.
    EmployeeId, "employee ID"
);

define_string_id!(
    /// A validated punch identifier.
    ///
    /// Shifts borrow the identifier of their opening punch for traceability.
    PunchId, "punch ID"
);

define_string_id!(
    /// A validated break interval identifier.
    BreakId, "break ID"
);

impl From<uuid::Uuid> for PunchId {
    fn from(id: uuid::Uuid) -> Self {
        Self(id.to_string())
    }
}
