//! The observation fetch payload is wire vocabulary shared with the ingest
//! backend (spec.md §4.6), so its shape lives in `record-core` and is just
//! re-exported here under the name the rest of this crate's API uses.

pub use record_core::{ObservationEntry, ObservationPayload};
