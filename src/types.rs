//! Core data model types for the join.
//!
//! Rows, schemas, and resources follow the host pipeline's tabular-data
//! convention: a row is an ordered map of field name to dynamically typed
//! value, and a manifest is an ordered list of resource descriptors with
//! nested field schemas. This module only defines the shapes the join core
//! reads and writes; parsing and serializing the surrounding manifest is the
//! host's job.

use serde::{Deserialize, Serialize};

use crate::error::JoinResult;

/// A single row: an ordered mapping from field name to value.
///
/// Field order is preserved (`serde_json` with `preserve_order`), which
/// matters for enrichment: merged fields overwrite in place and every other
/// field keeps its position.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A single named, typed field in a [`Schema`].
///
/// The type is an open string (`"number"`, `"string"`, `"array"`, ...) in the
/// host's vocabulary; the join copies types verbatim rather than interpreting
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Declared field type, copied verbatim from/to the manifest.
    #[serde(rename = "type")]
    pub field_type: String,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
        }
    }
}

/// An ordered list of fields describing a resource's row shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered list of fields.
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Returns the first field with the given name, if present.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A resource descriptor: one named tabular stream in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Resource name, unique within the manifest.
    pub name: String,
    /// Storage path advertised for the resource.
    #[serde(default)]
    pub path: String,
    /// Row schema for the resource.
    #[serde(default)]
    pub schema: Schema,
}

/// An ordered list of resource descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Resources in stream order.
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
}

/// A lazy, single-pass row stream.
///
/// Rows are pulled one at a time in strict arrival order and never revisited.
pub type RowStream = Box<dyn Iterator<Item = JoinResult<Row>>>;

/// A named row stream, paired with its manifest entry by name.
pub struct ResourceStream {
    /// Resource name, matching the manifest.
    pub name: String,
    /// The rows themselves.
    pub rows: RowStream,
}

impl ResourceStream {
    /// Create a resource stream from any row iterator.
    pub fn new<I>(name: impl Into<String>, rows: I) -> Self
    where
        I: Iterator<Item = JoinResult<Row>> + 'static,
    {
        Self {
            name: name.into(),
            rows: Box::new(rows),
        }
    }

    /// Create a resource stream from already-materialized rows.
    ///
    /// Mostly useful in tests and small pipelines.
    pub fn from_rows(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self::new(name, rows.into_iter().map(Ok))
    }
}

impl std::fmt::Debug for ResourceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStream")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Field, Manifest, ResourceSpec, Schema};

    #[test]
    fn schema_field_lookup_finds_first_match() {
        let schema = Schema::new(vec![
            Field::new("id", "integer"),
            Field::new("amount", "number"),
            Field::new("amount", "string"),
        ]);
        assert_eq!(schema.field("amount").unwrap().field_type, "number");
        assert!(schema.field("missing").is_none());
    }

    #[test]
    fn manifest_deserializes_with_defaults() {
        let manifest: Manifest = serde_json::from_value(serde_json::json!({
            "resources": [
                {"name": "sales", "schema": {"fields": [{"name": "id", "type": "integer"}]}},
                {"name": "notes"}
            ]
        }))
        .unwrap();

        assert_eq!(manifest.resources.len(), 2);
        assert_eq!(manifest.resources[0].schema.fields[0].field_type, "integer");
        assert_eq!(manifest.resources[1], ResourceSpec {
            name: "notes".to_string(),
            path: String::new(),
            schema: Schema::default(),
        });
    }
}
