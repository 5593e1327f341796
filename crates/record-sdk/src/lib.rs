//! The contract an HTTP service embeds to participate in the record/replay
//! substrate (spec.md §4.2/§4.3): an inbound `tower` layer that mints or
//! propagates context and ships `request`/`response` records, an outbound
//! client wrapper that does the same for dependency calls (or rewrites them
//! onto the replay proxy in debug mode), and an observation channel for
//! re-injecting recorded in-process values during replay.
//!
//! This crate is the library boundary: it has no `main`, and (per spec.md
//! §9) holds no process-global state — every piece takes an explicit
//! `Arc<Instrumentation>` or [`ServiceContext`] rather than reaching for a
//! package-level singleton the way the original Go SDK does.

pub mod config;
pub mod context;
pub mod inbound;
pub mod instrumentation;
pub mod observation;
pub mod observer;
pub mod outbound;

pub use config::{Config, RawConfig};
pub use context::{ContextError, ServiceContext};
pub use inbound::AuditLayer;
pub use instrumentation::{Instrumentation, SdkError};
pub use observation::{ObservationEntry, ObservationPayload};
pub use observer::Observer;
pub use outbound::{InstrumentedResponse, ReplayClient};
