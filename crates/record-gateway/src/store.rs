//! The ingest store: `RC -> ordered list of records` (spec.md §3), guarded
//! by a single reader-writer lock the way `agentgateway`'s own
//! `store::binds::Store` guards its maps (`crates/agentgateway/src/store/
//! binds.rs`), except here the lock itself is held by the caller rather than
//! wrapped in an updater type — this store has one writer path (ingest) and
//! several reader paths (replay, proxy, observations), none of which mutate.

use std::collections::HashMap;

use parking_lot::RwLock;
use record_core::{Id, Record};

/// `store[rc] -> Vec<Record>` (spec.md §3). Insertion order is preserved
/// (the order records arrive at ingest); reconstruction does not depend on
/// it (spec.md §8 property 8: tree-build is invariant under permutation of
/// the input records).
#[derive(Default)]
pub struct Store {
    data: RwLock<HashMap<Id, Vec<Record>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch of ingested records, grouping by `RequestContext`.
    pub fn insert(&self, records: Vec<Record>) {
        let mut data = self.data.write();
        for record in records {
            data.entry(record.request_context.clone())
                .or_default()
                .push(record);
        }
    }

    /// `true` if the store has ever seen a record for this `RC`.
    pub fn contains(&self, rc: &Id) -> bool {
        self.data.read().contains_key(rc)
    }

    /// Run `f` over the records for `rc` while holding the read lock —
    /// spec.md §5: "Readers do not mutate; they may hold the lock across a
    /// tree build." `f` must not block or await; it runs under the lock.
    pub fn with_records<R>(&self, rc: &Id, f: impl FnOnce(&[Record]) -> R) -> Option<R> {
        let data = self.data.read();
        let records = data.get(rc)?;
        Some(f(records))
    }
}
