//! `stream-join` performs a streaming key-based join with aggregation between
//! two named tabular resources inside a data pipeline: every row of a
//! *source* resource is folded into a key-indexed [`store`], and the *target*
//! resource is then either synthesized from the store (one row per distinct
//! key, deduplication mode) or enriched row by row with the aggregated values
//! for its key (enrichment mode).
//!
//! The primary entrypoint is [`processing::run`], which resolves the
//! configuration, rewrites the manifest (fail-fast on ordering and schema
//! errors), opens a disk-backed store scoped to the run, and routes the
//! resource streams.
//!
//! ## Aggregations
//!
//! Ten kinds, configured per output field: `sum`, `avg`, `max`, `min`,
//! `first`, `last`, `any`, `count`, `set`, `array`. See
//! [`aggregate::Aggregation`] for the exact semantics (null handling, fixed
//! output types, ordering guarantees).
//!
//! ## Quick example: deduplication
//!
//! ```rust
//! use stream_join::config::JoinConfig;
//! use stream_join::processing::run;
//! use stream_join::types::{Manifest, ResourceStream, Row};
//!
//! # fn main() -> Result<(), stream_join::JoinError> {
//! fn row(v: serde_json::Value) -> Row {
//!     v.as_object().cloned().unwrap()
//! }
//!
//! let config: JoinConfig = serde_json::from_value(serde_json::json!({
//!     "source": {"name": "sales", "key": "{k}"},
//!     "target": {"name": "totals", "key": null},
//!     "fields": {"total": {"name": "v", "aggregate": "sum"}}
//! }))?;
//!
//! let manifest: Manifest = serde_json::from_value(serde_json::json!({
//!     "resources": [{
//!         "name": "sales",
//!         "path": "data/sales.csv",
//!         "schema": {"fields": [
//!             {"name": "k", "type": "string"},
//!             {"name": "v", "type": "number"}
//!         ]}
//!     }]
//! }))?;
//!
//! let sales = ResourceStream::from_rows("sales", vec![
//!     row(serde_json::json!({"k": "a", "v": 1})),
//!     row(serde_json::json!({"k": "a", "v": 2})),
//!     row(serde_json::json!({"k": "b", "v": 5})),
//! ]);
//!
//! let (manifest, streams) = run(config, manifest, vec![sales])?;
//! // The manifest now advertises the synthesized resource after the source.
//! assert_eq!(manifest.resources[1].name, "totals");
//! assert_eq!(manifest.resources[1].schema.fields[0].field_type, "number");
//!
//! // Drain the streams in order: the forwarded source, then the synthesis.
//! let mut emitted = Vec::new();
//! for stream in streams {
//!     let ResourceStream { name, rows } = stream?;
//!     for r in rows {
//!         emitted.push((name.clone(), r?));
//!     }
//! }
//! assert_eq!(emitted.len(), 5); // 3 forwarded + 2 synthesized
//! assert_eq!(emitted[3].1, row(serde_json::json!({"total": 3}))); // key "a"
//! assert_eq!(emitted[4].1, row(serde_json::json!({"total": 5}))); // key "b"
//! # Ok(())
//! # }
//! ```
//!
//! ## Enrichment with a caller-provided store
//!
//! [`processing::route_streams`] takes any [`store::AggregationStore`]; the
//! in-memory backend is handy for small inputs and tests:
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use stream_join::config::JoinConfig;
//! use stream_join::processing::route_streams;
//! use stream_join::store::MemoryStore;
//! use stream_join::types::{ResourceStream, Row};
//!
//! # fn main() -> Result<(), stream_join::JoinError> {
//! fn row(v: serde_json::Value) -> Row {
//!     v.as_object().cloned().unwrap()
//! }
//!
//! let config: JoinConfig = serde_json::from_value(serde_json::json!({
//!     "source": {"name": "rates", "key": "{ccy}", "delete": true},
//!     "target": {"name": "orders", "key": "{ccy}", "full": false},
//!     "fields": {"rate": {"aggregate": "last"}}
//! }))?;
//!
//! let rates = ResourceStream::from_rows("rates", vec![
//!     row(serde_json::json!({"ccy": "EUR", "rate": 1.1})),
//! ]);
//! let orders = ResourceStream::from_rows("orders", vec![
//!     row(serde_json::json!({"id": 1, "ccy": "EUR"})),
//!     row(serde_json::json!({"id": 2, "ccy": "JPY"})), // no match: dropped
//! ]);
//!
//! let store = Rc::new(RefCell::new(MemoryStore::new()));
//! let streams = route_streams(Rc::new(config.resolve()), store, vec![rates, orders]);
//!
//! let mut emitted = Vec::new();
//! for stream in streams {
//!     for r in stream?.rows {
//!         emitted.push(r?);
//!     }
//! }
//! assert_eq!(emitted, vec![
//!     row(serde_json::json!({"id": 1, "ccy": "EUR", "rate": 1.1})),
//! ]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: host-supplied configuration and its resolved form
//! - [`key`]: key derivation from rows
//! - [`aggregate`]: aggregation kinds and accumulator state
//! - [`store`]: key-indexed aggregation storage (memory and disk backends)
//! - [`processing`]: indexer, emitter, schema deriver, and stream router
//! - [`types`]: rows, schemas, resources, and streams
//! - [`error`]: the crate-wide error type

pub mod aggregate;
pub mod config;
pub mod error;
pub mod key;
pub mod processing;
pub mod store;
pub mod types;

pub use error::{JoinError, JoinResult};
