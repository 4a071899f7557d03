//! Source-stream indexing.
//!
//! The indexer is the store's sole writer: for every source row it computes
//! the row's key, folds each configured field into the key's accumulator
//! state, and writes the state back. Whether the row is then forwarded
//! downstream is the router's decision (the `delete` flag).

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::aggregate::Aggregation;
use crate::config::ResolvedConfig;
use crate::error::JoinResult;
use crate::store::AggregationStore;
use crate::types::{Row, RowStream};

/// A row stream shared between the indexing pass and the deduplication
/// emitter, so the emitter can drain whatever the consumer left behind.
pub type SharedRows = Rc<RefCell<RowStream>>;

/// Index a single source row into the store.
///
/// Read-modify-write per key: absent state reads as empty, every configured
/// field is accumulated, and the whole state is written back. `count` never
/// reads the row's value.
pub fn index_row<S: AggregationStore + ?Sized>(
    config: &ResolvedConfig,
    store: &mut S,
    row: &Row,
) -> JoinResult<()> {
    let key = config.source_key.format(row)?;
    let mut state = store.get(&key)?.unwrap_or_default();
    for field in &config.fields {
        let curr = state.remove(&field.output);
        let new = if field.aggregate == Aggregation::Count {
            &Value::Null
        } else {
            row.get(&field.source).unwrap_or(&Value::Null)
        };
        let next = field.aggregate.accumulate(curr, new, &field.output)?;
        state.insert(field.output.clone(), next);
    }
    store.set(&key, &state)
}

/// Drain a source stream completely, indexing every row and forwarding none.
pub fn drain_and_index<S: AggregationStore + ?Sized>(
    config: &ResolvedConfig,
    store: &RefCell<S>,
    rows: &SharedRows,
) -> JoinResult<()> {
    loop {
        let row = rows.borrow_mut().next();
        match row {
            Some(row) => index_row(config, &mut *store.borrow_mut(), &row?)?,
            None => return Ok(()),
        }
    }
}

/// Streaming indexer: forwards every source row unchanged after indexing it,
/// preserving order and content.
///
/// Fuses after the first error; a failed run must not resume.
pub struct IndexedRows<S> {
    config: Rc<ResolvedConfig>,
    store: Rc<RefCell<S>>,
    rows: SharedRows,
    failed: bool,
}

impl<S: AggregationStore> IndexedRows<S> {
    /// Wrap a source row stream.
    pub fn new(config: Rc<ResolvedConfig>, store: Rc<RefCell<S>>, rows: SharedRows) -> Self {
        Self {
            config,
            store,
            rows,
            failed: false,
        }
    }
}

impl<S: AggregationStore> Iterator for IndexedRows<S> {
    type Item = JoinResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let row = self.rows.borrow_mut().next()?;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                self.failed = true;
                return Some(Err(e));
            }
        };
        if let Err(e) = index_row(&self.config, &mut *self.store.borrow_mut(), &row) {
            self.failed = true;
            return Some(Err(e));
        }
        Some(Ok(row))
    }
}
