//! Validated identifier newtypes.
//!
//! The identity provider hands the backend opaque user identifiers; the
//! engine validates them as UUIDs once at the boundary and carries the
//! parsed form everywhere else. Challenge identifiers follow the same
//! pattern so the two cannot be swapped by accident.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validation errors returned by the identifier constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdValidationError {
    /// The identifier string was empty.
    Empty,
    /// The identifier string was not a valid UUID (or carried padding).
    Invalid,
}

impl fmt::Display for IdValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "identifier must not be empty"),
            Self::Invalid => write!(f, "identifier must be a valid UUID"),
        }
    }
}

impl std::error::Error for IdValidationError {}

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Uuid, String);

        impl $name {
            /// Validate and construct an identifier from borrowed input.
            pub fn new(id: impl AsRef<str>) -> Result<Self, IdValidationError> {
                Self::from_owned(id.as_ref().to_owned())
            }

            /// Construct an identifier directly from an already-valid UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                let raw = uuid.to_string();
                Self(uuid, raw)
            }

            /// Generate a new random identifier.
            #[must_use]
            pub fn random() -> Self {
                Self::from_uuid(Uuid::new_v4())
            }

            fn from_owned(id: String) -> Result<Self, IdValidationError> {
                if id.is_empty() {
                    return Err(IdValidationError::Empty);
                }
                if id.trim() != id {
                    return Err(IdValidationError::Invalid);
                }
                let parsed = Uuid::parse_str(&id).map_err(|_| IdValidationError::Invalid)?;
                Ok(Self(parsed, id))
            }

            /// Access the underlying UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.1.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_ref())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.1
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::from_owned(value)
            }
        }
    };
}

uuid_id! {
    /// Stable user identifier supplied by the identity provider.
    UserId
}

uuid_id! {
    /// Stable challenge identifier.
    ChallengeId
}
