//! Target-stream emission.
//!
//! Two mutually exclusive modes, chosen by whether a target key template is
//! configured:
//!
//! - **Deduplication** ([`DedupRows`]): no target key. One synthesized row per
//!   distinct key, in ascending key order, carrying exactly the finalized
//!   output fields.
//! - **Enrichment** ([`EnrichedRows`]): a target key. Each target row is
//!   looked up by key and merged with the finalized fields; a miss either
//!   nulls the fields (`full = true`, outer join) or drops the row
//!   (`full = false`, inner join).
//!
//! Both read the store only; indexing has finished by the time either runs.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::Value;

use crate::aggregate::AccumulatorState;
use crate::config::{ResolvedConfig, ResolvedField};
use crate::error::JoinResult;
use crate::key::KeyTemplate;
use crate::store::{AggregationStore, KEY_PAGE};
use crate::types::{Row, RowStream};

use super::indexer::{SharedRows, drain_and_index};

/// Finalize a key's stored state into output fields, in ascending
/// output-name order. Fields missing from the state finalize to null.
pub fn finalize_state(fields: &[ResolvedField], mut state: AccumulatorState) -> Row {
    let mut row = Row::new();
    for field in fields {
        let value = match state.remove(&field.output) {
            Some(acc) => field.aggregate.finalize(acc),
            None => Value::Null,
        };
        row.insert(field.output.clone(), value);
    }
    row
}

/// Deduplication emitter: one row per distinct key, ascending by key.
///
/// If the consumer dropped the forwarded source stream before draining it,
/// the leftover rows are indexed here first, so the store is always complete
/// before the first key is read.
pub struct DedupRows<S> {
    config: Rc<ResolvedConfig>,
    store: Rc<RefCell<S>>,
    /// Remaining source rows to drain before key iteration, if any.
    source: Option<SharedRows>,
    buf: VecDeque<String>,
    last: Option<String>,
    exhausted: bool,
    failed: bool,
}

impl<S: AggregationStore> DedupRows<S> {
    /// Create the synthesized target stream.
    ///
    /// `source` is the shared source stream in forwarding mode, or `None`
    /// when the router already drained it (`delete` mode).
    pub fn new(
        config: Rc<ResolvedConfig>,
        store: Rc<RefCell<S>>,
        source: Option<SharedRows>,
    ) -> Self {
        Self {
            config,
            store,
            source,
            buf: VecDeque::new(),
            last: None,
            exhausted: false,
            failed: false,
        }
    }

    fn next_key(&mut self) -> JoinResult<Option<String>> {
        if self.buf.is_empty() {
            if self.exhausted {
                return Ok(None);
            }
            let page = self
                .store
                .borrow()
                .key_page(self.last.as_deref(), KEY_PAGE)?;
            if page.len() < KEY_PAGE {
                self.exhausted = true;
            }
            self.buf.extend(page);
        }
        let key = self.buf.pop_front();
        if let Some(key) = &key {
            self.last = Some(key.clone());
        }
        Ok(key)
    }
}

impl<S: AggregationStore> Iterator for DedupRows<S> {
    type Item = JoinResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(rows) = self.source.take() {
            if let Err(e) = drain_and_index(&self.config, &self.store, &rows) {
                self.failed = true;
                return Some(Err(e));
            }
        }
        let key = match self.next_key() {
            Ok(Some(key)) => key,
            Ok(None) => return None,
            Err(e) => {
                self.failed = true;
                return Some(Err(e));
            }
        };
        let state = match self.store.borrow().get(&key) {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                self.failed = true;
                return Some(Err(e));
            }
        };
        Some(Ok(finalize_state(&self.config.fields, state)))
    }
}

/// Enrichment emitter: each target row merged with the finalized fields for
/// its key.
pub struct EnrichedRows<S> {
    config: Rc<ResolvedConfig>,
    key: KeyTemplate,
    store: Rc<RefCell<S>>,
    rows: RowStream,
    failed: bool,
}

impl<S: AggregationStore> EnrichedRows<S> {
    /// Wrap a target row stream. `key` is the configured target key template.
    pub fn new(
        config: Rc<ResolvedConfig>,
        key: KeyTemplate,
        store: Rc<RefCell<S>>,
        rows: RowStream,
    ) -> Self {
        Self {
            config,
            key,
            store,
            rows,
            failed: false,
        }
    }

    fn enrich(&self, mut row: Row) -> JoinResult<Option<Row>> {
        let key = self.key.format(&row)?;
        let extra = match self.store.borrow().get(&key)? {
            Some(state) => finalize_state(&self.config.fields, state),
            None if self.config.full => {
                // Outer-join semantics: every configured field, all null.
                finalize_state(&self.config.fields, AccumulatorState::new())
            }
            None => return Ok(None),
        };
        for (name, value) in extra {
            row.insert(name, value);
        }
        Ok(Some(row))
    }
}

impl<S: AggregationStore> Iterator for EnrichedRows<S> {
    type Item = JoinResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let row = match self.rows.next()? {
                Ok(row) => row,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            match self.enrich(row) {
                Ok(Some(row)) => return Some(Ok(row)),
                Ok(None) => continue,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::finalize_state;
    use crate::aggregate::{AccumulatorState, Accumulator};
    use crate::config::JoinConfig;
    use serde_json::json;

    #[test]
    fn finalize_state_emits_fields_in_sorted_output_order() {
        let config: JoinConfig = serde_json::from_value(json!({
            "source": {"name": "s", "key": "{k}"},
            "target": {"name": "t", "key": null},
            "fields": {
                "total": {"name": "v", "aggregate": "sum"},
                "mean": {"name": "v", "aggregate": "avg"},
                "n": {"aggregate": "count"}
            }
        }))
        .unwrap();
        let config = config.resolve();

        let mut state = AccumulatorState::new();
        state.insert("total".to_string(), Accumulator::Scalar(json!(7)));
        state.insert("mean".to_string(), Accumulator::Avg { count: 2, sum: 7.0 });
        state.insert("n".to_string(), Accumulator::Count(2));

        let row = finalize_state(&config.fields, state);
        let names: Vec<&String> = row.keys().collect();
        assert_eq!(names, ["mean", "n", "total"]);
        assert_eq!(row["total"], json!(7));
        assert_eq!(row["mean"], json!(3.5));
        assert_eq!(row["n"], json!(2));
    }

    #[test]
    fn finalize_state_nulls_missing_fields() {
        let config: JoinConfig = serde_json::from_value(json!({
            "source": {"name": "s", "key": "{k}"},
            "target": {"name": "t", "key": null},
            "fields": {"total": {"aggregate": "sum"}}
        }))
        .unwrap();
        let row = finalize_state(&config.resolve().fields, AccumulatorState::new());
        assert_eq!(row["total"], json!(null));
    }
}
