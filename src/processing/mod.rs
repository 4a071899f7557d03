//! Two-phase stream processing: index, then emit.
//!
//! The pieces compose in a fixed order, driven by the [`router`]:
//!
//! - [`indexer`]: drains or forwards the source resource, folding every row
//!   into the aggregation store.
//! - [`emitter`]: synthesizes one row per stored key (deduplication) or
//!   enriches each target row by key lookup (enrichment), reading the
//!   now-complete store.
//! - [`schema`]: derives the output fields the rewritten manifest advertises
//!   for the target resource, from the same field configuration.
//! - [`router`]: resource-level sequencing, manifest rewrite, and the
//!   [`router::run`] entry point.
//!
//! Processing is single-threaded and pull-driven: each resource is a lazy,
//! single-pass row sequence consumed exactly once, and a failure at any stage
//! is terminal for the run.

pub mod emitter;
pub mod indexer;
pub mod router;
pub mod schema;

pub use emitter::{DedupRows, EnrichedRows, finalize_state};
pub use indexer::{IndexedRows, index_row};
pub use router::{RoutedStreams, rewrite_manifest, route_streams, run};
pub use schema::derive_target_fields;
