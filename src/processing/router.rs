//! Resource-level routing.
//!
//! The router drives one pass over the resource sequence: the source resource
//! is indexed (and forwarded or swallowed per the `delete` flag), the target
//! resource is enriched or synthesized, and every other resource passes
//! through untouched. [`rewrite_manifest`] mirrors the same restructuring on
//! the manifest, and is where ordering and schema-resolution errors surface,
//! before any row is processed.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::{JoinConfig, ResolvedConfig};
use crate::error::{JoinError, JoinResult};
use crate::key::KeyTemplate;
use crate::processing::emitter::{DedupRows, EnrichedRows};
use crate::processing::indexer::{IndexedRows, SharedRows, drain_and_index};
use crate::processing::schema::derive_target_fields;
use crate::store::{AggregationStore, SqliteStore};
use crate::types::{Manifest, ResourceSpec, ResourceStream, Schema};

/// Rewrite the manifest to advertise what the routed streams will carry.
///
/// - The source entry is dropped when `source.delete` is set.
/// - Deduplication mode inserts a new target entry (path
///   `data/<target>.csv`, derived schema) immediately after the source entry.
/// - Enrichment mode rewrites the existing target entry in place, appending
///   the derived fields to its schema, and requires the source entry to
///   precede it.
pub fn rewrite_manifest(config: &ResolvedConfig, manifest: Manifest) -> JoinResult<Manifest> {
    let mut resources = Vec::with_capacity(manifest.resources.len() + 1);
    let mut source_schema: Option<Schema> = None;

    for resource in manifest.resources {
        if resource.name == config.source_name {
            let schema = resource.schema.clone();
            if !config.source_delete {
                resources.push(resource);
            }
            if config.deduplication() {
                resources.push(ResourceSpec {
                    name: config.target_name.clone(),
                    path: format!("data/{}.csv", config.target_name),
                    schema: Schema::new(derive_target_fields(config, &schema)?),
                });
            }
            source_schema = Some(schema);
        } else if resource.name == config.target_name && !config.deduplication() {
            let schema = source_schema
                .as_ref()
                .ok_or_else(|| ordering_violation(config))?;
            let mut resource = resource;
            resource
                .schema
                .fields
                .extend(derive_target_fields(config, schema)?);
            resources.push(resource);
        } else {
            resources.push(resource);
        }
    }

    Ok(Manifest { resources })
}

fn ordering_violation(config: &ResolvedConfig) -> JoinError {
    JoinError::OrderingViolation {
        source_name: config.source_name.clone(),
        target_name: config.target_name.clone(),
    }
}

/// The routed resource sequence: a lazy, single-pass stream of streams.
///
/// Construct via [`route_streams`] (caller-provided store) or [`run`]
/// (manifest rewrite plus a fresh disk-backed store).
pub struct RoutedStreams<S, I> {
    config: Rc<ResolvedConfig>,
    store: Rc<RefCell<S>>,
    resources: I,
    source_seen: bool,
    pending: Option<ResourceStream>,
    failed: bool,
}

impl<S, I> Iterator for RoutedStreams<S, I>
where
    S: AggregationStore + 'static,
    I: Iterator<Item = ResourceStream>,
{
    type Item = JoinResult<ResourceStream>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(stream) = self.pending.take() {
            return Some(Ok(stream));
        }
        loop {
            let resource = self.resources.next()?;
            if resource.name == self.config.source_name {
                match self.route_source(resource) {
                    Ok(Some(stream)) => return Some(Ok(stream)),
                    // Source swallowed entirely; move on to the next resource.
                    Ok(None) => continue,
                    Err(e) => return Some(Err(e)),
                }
            }
            if resource.name == self.config.target_name {
                // Only enrichment mode reads the target stream; in
                // deduplication mode a resource bearing the target name
                // passes through like any other.
                if let Some(key) = self.config.target_key.clone() {
                    return Some(self.route_target(resource, key));
                }
            }
            return Some(Ok(resource));
        }
    }
}

impl<S, I> RoutedStreams<S, I>
where
    S: AggregationStore + 'static,
    I: Iterator<Item = ResourceStream>,
{
    /// Handle the source resource. Returns `Ok(None)` when the resource is
    /// swallowed entirely (`delete` without deduplication).
    fn route_source(&mut self, resource: ResourceStream) -> JoinResult<Option<ResourceStream>> {
        self.source_seen = true;
        let rows: SharedRows = Rc::new(RefCell::new(resource.rows));

        if self.config.source_delete {
            // Pure side-effecting sink: index everything, forward nothing.
            if let Err(e) = drain_and_index(&self.config, &self.store, &rows) {
                self.failed = true;
                return Err(e);
            }
            if self.config.deduplication() {
                return Ok(Some(self.dedup_stream(None)));
            }
            return Ok(None);
        }

        if self.config.deduplication() {
            self.pending = Some(self.dedup_stream(Some(rows.clone())));
        }
        Ok(Some(ResourceStream {
            name: resource.name,
            rows: Box::new(IndexedRows::new(
                self.config.clone(),
                self.store.clone(),
                rows,
            )),
        }))
    }

    fn route_target(
        &mut self,
        resource: ResourceStream,
        key: KeyTemplate,
    ) -> JoinResult<ResourceStream> {
        if !self.source_seen {
            self.failed = true;
            return Err(ordering_violation(&self.config));
        }
        Ok(ResourceStream {
            name: resource.name,
            rows: Box::new(EnrichedRows::new(
                self.config.clone(),
                key,
                self.store.clone(),
                resource.rows,
            )),
        })
    }

    fn dedup_stream(&self, source: Option<SharedRows>) -> ResourceStream {
        ResourceStream {
            name: self.config.target_name.clone(),
            rows: Box::new(DedupRows::new(
                self.config.clone(),
                self.store.clone(),
                source,
            )),
        }
    }
}

/// Route a resource sequence through the join, using a caller-provided store.
///
/// The store must be empty; it is populated while the source stream is
/// consumed and read when the target stream is consumed. Streams must be
/// drained in the order they are yielded.
pub fn route_streams<S, I>(
    config: Rc<ResolvedConfig>,
    store: Rc<RefCell<S>>,
    resources: I,
) -> RoutedStreams<S, I::IntoIter>
where
    S: AggregationStore + 'static,
    I: IntoIterator<Item = ResourceStream>,
{
    RoutedStreams {
        config,
        store,
        resources: resources.into_iter(),
        source_seen: false,
        pending: None,
        failed: false,
    }
}

/// Run a complete join: resolve the configuration, rewrite the manifest
/// (failing fast on ordering and schema-resolution errors), open a fresh
/// disk-backed store scoped to this run, and return the rewritten manifest
/// with the routed streams.
///
/// The store's backing file is deleted when the returned streams are
/// dropped, on every exit path.
pub fn run<I>(
    config: JoinConfig,
    manifest: Manifest,
    resources: I,
) -> JoinResult<(Manifest, RoutedStreams<SqliteStore, I::IntoIter>)>
where
    I: IntoIterator<Item = ResourceStream>,
{
    let config = Rc::new(config.resolve());
    let manifest = rewrite_manifest(&config, manifest)?;
    let store = Rc::new(RefCell::new(SqliteStore::new()?));
    Ok((manifest, route_streams(config, store, resources)))
}
