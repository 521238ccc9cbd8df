//! Document schemas and write-time sanitisation.
//!
//! The document store cannot represent "undefined": every document that
//! reaches it must carry all of its collection's keys, with deliberately
//! absent values stored as explicit nulls. Sanitisation runs on every write,
//! unconditionally. A missing optional key is filled with null; a missing
//! required key or an unrecognised key is a programming defect and fails the
//! whole batch.

use std::fmt;

use serde_json::Value;

/// Whether a key may legitimately hold null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The key must carry a non-null value.
    Required,
    /// The key may be null, but must still be present.
    Nullable,
}

/// One key of a collection schema.
#[derive(Debug)]
pub struct FieldSpec {
    /// Document key, in stored (camelCase) form.
    pub key: &'static str,
    /// Null policy for the key.
    pub presence: Presence,
    /// Schema of the nested object this key holds, if any.
    pub nested: Option<&'static [FieldSpec]>,
}

impl FieldSpec {
    const fn required(key: &'static str) -> Self {
        Self {
            key,
            presence: Presence::Required,
            nested: None,
        }
    }

    const fn nullable(key: &'static str) -> Self {
        Self {
            key,
            presence: Presence::Nullable,
            nested: None,
        }
    }

    const fn object(key: &'static str, nested: &'static [FieldSpec]) -> Self {
        Self {
            key,
            presence: Presence::Required,
            nested: Some(nested),
        }
    }
}

/// Schema of one collection.
#[derive(Debug)]
pub struct CollectionSchema {
    /// Collection name, used in error context.
    pub name: &'static str,
    /// Keys every document in the collection carries.
    pub fields: &'static [FieldSpec],
}

/// Schema of the `challenges` collection.
pub static CHALLENGES: CollectionSchema = CollectionSchema {
    name: "challenges",
    fields: &[
        FieldSpec::required("id"),
        FieldSpec::required("title"),
        FieldSpec::required("description"),
        FieldSpec::required("category"),
        FieldSpec::required("challengeType"),
        FieldSpec::required("difficulty"),
        FieldSpec::required("status"),
        FieldSpec::required("startDate"),
        FieldSpec::required("endDate"),
        FieldSpec::object("rewards", &[FieldSpec::required("baseXp")]),
        FieldSpec::required("participantCount"),
        FieldSpec::required("completionCount"),
        FieldSpec::nullable("tierRequirement"),
    ],
};

/// Schema of the `userChallenges` collection.
pub static USER_CHALLENGES: CollectionSchema = CollectionSchema {
    name: "userChallenges",
    fields: &[
        FieldSpec::required("userId"),
        FieldSpec::required("challengeId"),
        FieldSpec::required("status"),
        FieldSpec::required("progress"),
        FieldSpec::required("attempts"),
        FieldSpec::required("startedAt"),
        FieldSpec::nullable("completedAt"),
        FieldSpec::required("submissions"),
    ],
};

/// Schema of the `userXp` collection.
pub static USER_XP: CollectionSchema = CollectionSchema {
    name: "userXp",
    fields: &[
        FieldSpec::required("userId"),
        FieldSpec::required("totalXp"),
        FieldSpec::required("level"),
        FieldSpec::object(
            "tierCounts",
            &[
                FieldSpec::required("solo"),
                FieldSpec::required("trade"),
                FieldSpec::required("collaboration"),
            ],
        ),
    ],
};

/// Schema of the `userStreaks` collection.
pub static USER_STREAKS: CollectionSchema = CollectionSchema {
    name: "userStreaks",
    fields: &[
        FieldSpec::required("currentStreak"),
        FieldSpec::required("longestStreak"),
        FieldSpec::nullable("lastActivityDate"),
        FieldSpec::required("freezesAvailable"),
        FieldSpec::nullable("lastFreezeAt"),
    ],
};

/// Schema of the `completionRecords` collection.
pub static COMPLETION_RECORDS: CollectionSchema = CollectionSchema {
    name: "completionRecords",
    fields: &[
        FieldSpec::required("userId"),
        FieldSpec::required("challengeId"),
        FieldSpec::required("completedAt"),
        FieldSpec::required("xpAwarded"),
        FieldSpec::object(
            "bonusBreakdown",
            &[
                FieldSpec::required("quality"),
                FieldSpec::required("earlyCompletion"),
                FieldSpec::required("firstAttempt"),
            ],
        ),
        FieldSpec::required("baseXp"),
        FieldSpec::nullable("difficultyRating"),
    ],
};

/// Schema of the `xpTransactions` collection.
pub static XP_TRANSACTIONS: CollectionSchema = CollectionSchema {
    name: "xpTransactions",
    fields: &[
        FieldSpec::required("userId"),
        FieldSpec::required("source"),
        FieldSpec::required("amount"),
        FieldSpec::nullable("challengeId"),
        FieldSpec::required("recordedAt"),
    ],
};

/// Sanitisation failures; any of these fails the whole write batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    /// The document (or a nested object) was not a JSON object.
    NotAnObject {
        /// Path to the offending value.
        path: String,
    },
    /// A required key was missing or null.
    MissingRequired {
        /// Path to the missing key.
        path: String,
    },
    /// A key the schema does not declare.
    UnknownKey {
        /// Path to the unexpected key.
        path: String,
    },
}

impl fmt::Display for SanitizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject { path } => write!(f, "{path}: expected an object"),
            Self::MissingRequired { path } => {
                write!(f, "{path}: required key missing or null")
            }
            Self::UnknownKey { path } => write!(f, "{path}: key not declared in schema"),
        }
    }
}

impl std::error::Error for SanitizeError {}

/// Sanitise a document against its collection schema.
///
/// Fills missing nullable keys with explicit null and rejects missing
/// required keys and undeclared keys. The document is modified in place.
pub fn sanitize(schema: &CollectionSchema, document: &mut Value) -> Result<(), SanitizeError> {
    sanitize_object(schema.name, schema.fields, document)
}

fn sanitize_object(
    path: &str,
    fields: &[FieldSpec],
    value: &mut Value,
) -> Result<(), SanitizeError> {
    let Some(object) = value.as_object_mut() else {
        return Err(SanitizeError::NotAnObject {
            path: path.to_owned(),
        });
    };

    for key in object.keys() {
        if !fields.iter().any(|field| field.key == key) {
            return Err(SanitizeError::UnknownKey {
                path: format!("{path}.{key}"),
            });
        }
    }

    for field in fields {
        let field_path = format!("{path}.{}", field.key);
        match (object.get_mut(field.key), field.presence) {
            (None | Some(Value::Null), Presence::Required) => {
                return Err(SanitizeError::MissingRequired { path: field_path });
            }
            (None, Presence::Nullable) => {
                object.insert(field.key.to_owned(), Value::Null);
            }
            (Some(Value::Null), Presence::Nullable) => {}
            (Some(nested_value), _) => {
                if let Some(nested_fields) = field.nested {
                    sanitize_object(&field_path, nested_fields, nested_value)?;
                }
            }
        }
    }

    Ok(())
}
