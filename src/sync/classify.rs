use crate::{RelationDef, Schema};
use serde_json::Value as JsonValue;

/// What a key of a desired-state node stands for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification<'a> {
    /// A column value, possibly JSON typed
    Scalar,
    /// A declared relation
    Relation(&'a RelationDef),
}

/// Classify `kind#key` for `value`
///
/// A key is a relation only when `kind` declares it and the value is object,
/// array or null shaped. Anything else is a scalar, so a JSON column holding an
/// object stays a column. A null relation value classifies as a relation so it
/// is never written as a column; the orchestrator then leaves it untouched.
pub fn classify<'a>(
    schema: &'a Schema,
    kind: &str,
    key: &str,
    value: &JsonValue,
) -> Classification<'a> {
    match schema.describe_relation(kind, key) {
        Some(relation) if value.is_object() || value.is_array() || value.is_null() => {
            Classification::Relation(relation)
        }
        _ => Classification::Scalar,
    }
}
