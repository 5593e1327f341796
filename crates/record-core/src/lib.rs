//! Wire-level vocabulary shared by every participant in the record/replay
//! substrate: correlation identifiers, the `Record` struct, propagation
//! header names, and the `X-Debug-Config` grammar.
//!
//! This crate has no opinion on transport (HTTP client/server) or storage —
//! those live in `record-sdk` and `record-gateway` respectively. Everything
//! here is pure data plus the (de)serialization rules that make it portable
//! across process boundaries, since the JSON field keys are an external
//! contract (spec.md §4.1).

pub mod codec;
pub mod debug_config;
pub mod headers;
pub mod ids;
pub mod logging;
pub mod observation;
pub mod record;

pub use ids::{Id, new_id};
pub use observation::{ObservationEntry, ObservationPayload};
pub use record::{Record, RecordType};
