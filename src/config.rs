//! Host-supplied join configuration.
//!
//! The host pipeline validates the configuration against its own schema
//! upstream, so deserialization is the boundary here: shapes follow the
//! conventional join-processor parameters.
//!
//! ```json
//! {
//!   "source": {"name": "sales", "key": ["region", "sku"], "delete": false},
//!   "target": {"name": "report", "key": "{region}:{sku}", "full": true},
//!   "fields": {"total": {"name": "amount", "aggregate": "sum"}}
//! }
//! ```
//!
//! `target.key = null` (or omitted) selects deduplication mode; any other
//! value selects enrichment mode.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::aggregate::Aggregation;
use crate::key::KeyTemplate;

/// A key specification: either a ready-made `{field}` template or a list of
/// field names joined with `:` into one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum KeySpec {
    /// A template string with `{field}` placeholders, e.g. `"{region}:{sku}"`.
    Template(String),
    /// An ordered list of field names, e.g. `["region", "sku"]`.
    Fields(Vec<String>),
}

/// Configuration for the source (indexed) resource.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    /// Resource name to index.
    pub name: String,
    /// Key specification evaluated against each source row.
    pub key: KeySpec,
    /// When set, source rows are consumed without being forwarded downstream,
    /// and the source entry is dropped from the rewritten manifest.
    #[serde(default)]
    pub delete: bool,
}

/// Configuration for the target (emitted) resource.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TargetConfig {
    /// Resource name to emit.
    pub name: String,
    /// Key specification evaluated against each target row. `None` selects
    /// deduplication mode: the target resource is synthesized from the store
    /// instead of being read.
    #[serde(default)]
    pub key: Option<KeySpec>,
    /// Enrichment mode only: when `true` (the default), a target row whose key
    /// has no match is emitted with all configured fields null (outer join);
    /// when `false`, it is dropped (inner join).
    #[serde(default = "default_full")]
    pub full: bool,
}

fn default_full() -> bool {
    true
}

/// Per-output-field aggregation spec.
///
/// Both members are optional: the source field name defaults to the output
/// field name, and the aggregation defaults to [`Aggregation::Any`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FieldSpec {
    /// Source field to read, if different from the output field name.
    #[serde(default)]
    pub name: Option<String>,
    /// Aggregation kind applied to the field.
    #[serde(default)]
    pub aggregate: Option<Aggregation>,
}

/// Full join configuration as supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JoinConfig {
    /// Source (indexed) resource.
    pub source: SourceConfig,
    /// Target (emitted) resource.
    pub target: TargetConfig,
    /// Output field name -> aggregation spec. A `BTreeMap` so that field order
    /// is ascending by output name wherever it is observable.
    pub fields: BTreeMap<String, FieldSpec>,
}

impl JoinConfig {
    /// Apply defaults and compile key templates, producing the resolved form
    /// used by the processing stages.
    pub fn resolve(self) -> ResolvedConfig {
        let fields = self
            .fields
            .into_iter()
            .map(|(output, spec)| ResolvedField {
                source: spec.name.unwrap_or_else(|| output.clone()),
                aggregate: spec.aggregate.unwrap_or(Aggregation::Any),
                output,
            })
            .collect();

        ResolvedConfig {
            source_name: self.source.name,
            source_key: KeyTemplate::new(&self.source.key),
            source_delete: self.source.delete,
            target_name: self.target.name,
            target_key: self.target.key.as_ref().map(KeyTemplate::new),
            full: self.target.full,
            fields,
        }
    }
}

/// A [`FieldSpec`] with all defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    /// Output field name.
    pub output: String,
    /// Source field name to read from each source row.
    pub source: String,
    /// Aggregation kind.
    pub aggregate: Aggregation,
}

/// A [`JoinConfig`] with defaults applied and key templates compiled.
///
/// `fields` is sorted ascending by output name (inherited from the
/// `BTreeMap` iteration order), which fixes the observable field order in
/// schema emission and deduplication output.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub source_name: String,
    pub source_key: KeyTemplate,
    pub source_delete: bool,
    pub target_name: String,
    /// `None` selects deduplication mode.
    pub target_key: Option<KeyTemplate>,
    pub full: bool,
    pub fields: Vec<ResolvedField>,
}

impl ResolvedConfig {
    /// Whether this run synthesizes the target from the store (no target key).
    pub fn deduplication(&self) -> bool {
        self.target_key.is_none()
    }
}
