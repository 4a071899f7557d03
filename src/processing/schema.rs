//! Output schema derivation.
//!
//! Runs once per manifest rewrite, independently of the row flow, but over
//! the same resolved field configuration, so the advertised schema and the
//! emitted rows cannot drift apart.

use crate::config::ResolvedConfig;
use crate::error::{JoinError, JoinResult};
use crate::types::{Field, Schema};

/// Derive the output fields appended to the target resource's schema, in
/// ascending output-name order.
///
/// The output type is the aggregation's fixed type when it has one
/// (`count` -> `number`, `set`/`array` -> `array`); otherwise it is copied
/// from the first source-schema field matching the spec's source reference.
/// No fixed type and no match is a [`JoinError::SchemaResolution`], raised
/// during manifest rewrite, before any row is processed.
pub fn derive_target_fields(
    config: &ResolvedConfig,
    source_schema: &Schema,
) -> JoinResult<Vec<Field>> {
    config
        .fields
        .iter()
        .map(|field| {
            let field_type = match field.aggregate.fixed_type() {
                Some(fixed) => fixed.to_string(),
                None => source_schema
                    .field(&field.source)
                    .ok_or_else(|| JoinError::SchemaResolution {
                        field: field.output.clone(),
                        source_field: field.source.clone(),
                    })?
                    .field_type
                    .clone(),
            };
            Ok(Field::new(field.output.clone(), field_type))
        })
        .collect()
}
