//! Key-indexed aggregation storage.
//!
//! An [`AggregationStore`] maps string keys to per-field accumulator state.
//! It is created empty at the start of a run, written by the indexer, read by
//! the emitter, and discarded (backing storage included) when the run's
//! streams are dropped. There is no eviction: the store grows with the
//! distinct-key count for the lifetime of the run.
//!
//! Key iteration is paged so that no implementation needs all keys in process
//! memory at once; the [`Keys`] adapter turns paging into a lazy iterator in
//! ascending byte-lexicographic order.
//!
//! Two implementations are provided: [`MemoryStore`] for small inputs and
//! tests, and [`SqliteStore`](sqlite::SqliteStore) for inputs whose
//! distinct-key count should not be bound by process memory.

pub mod sqlite;

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::ops::Bound;

use crate::aggregate::AccumulatorState;
use crate::error::JoinResult;

pub use sqlite::SqliteStore;

/// Number of keys fetched per page during key iteration.
pub(crate) const KEY_PAGE: usize = 512;

/// A persistent mapping from key to per-field accumulator state.
///
/// All operations are synchronous and strictly ordered relative to the
/// caller; implementations carry no internal concurrency.
pub trait AggregationStore {
    /// Point lookup. Returns `None` for a key never written this run.
    fn get(&self, key: &str) -> JoinResult<Option<AccumulatorState>>;

    /// Upsert: inserts a new key or overwrites an existing one.
    fn set(&mut self, key: &str, state: &AccumulatorState) -> JoinResult<()>;

    /// Up to `limit` keys strictly greater than `after` (or the smallest keys
    /// when `after` is `None`), in ascending order.
    fn key_page(&self, after: Option<&str>, limit: usize) -> JoinResult<Vec<String>>;

    /// Lazily iterate all keys in ascending order.
    fn keys(&self) -> Keys<'_, Self>
    where
        Self: Sized,
    {
        Keys::new(self)
    }
}

/// Lazy ascending key iterator over any [`AggregationStore`], fetching
/// [`KEY_PAGE`] keys at a time.
pub struct Keys<'a, S: AggregationStore + ?Sized> {
    store: &'a S,
    buf: VecDeque<String>,
    last: Option<String>,
    exhausted: bool,
}

impl<'a, S: AggregationStore + ?Sized> Keys<'a, S> {
    /// Start iterating `store`'s keys from the beginning.
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            buf: VecDeque::new(),
            last: None,
            exhausted: false,
        }
    }
}

impl<S: AggregationStore + ?Sized> Iterator for Keys<'_, S> {
    type Item = JoinResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.is_empty() {
            if self.exhausted {
                return None;
            }
            let page = match self.store.key_page(self.last.as_deref(), KEY_PAGE) {
                Ok(page) => page,
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            };
            if page.len() < KEY_PAGE {
                self.exhausted = true;
            }
            self.buf.extend(page);
        }
        let key = self.buf.pop_front()?;
        self.last = Some(key.clone());
        Some(Ok(key))
    }
}

/// In-memory store backed by a sorted map.
///
/// Suitable for small inputs and tests; key count is bounded by process
/// memory. For large runs use [`SqliteStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, AccumulatorState>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys stored so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AggregationStore for MemoryStore {
    fn get(&self, key: &str) -> JoinResult<Option<AccumulatorState>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, state: &AccumulatorState) -> JoinResult<()> {
        self.entries.insert(key.to_string(), state.clone());
        Ok(())
    }

    fn key_page(&self, after: Option<&str>, limit: usize) -> JoinResult<Vec<String>> {
        let lower = match after {
            Some(after) => Bound::Excluded(after.to_string()),
            None => Bound::Unbounded,
        };
        Ok(self
            .entries
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(k, _)| k.clone())
            .collect())
    }
}
