//! The ingest backend (spec.md §4.4/§4.5/§4.6): accepts batches of records
//! from instrumented services, rebuilds the causal request tree on demand,
//! and runs the replay proxy that lets a debug-mode service's outbound calls
//! be served live or from the recorded snapshot.
//!
//! Grounded on `backend-runtime/backend.go`, the single-file Go prototype
//! this crate generalizes into a proper `axum` service the way `agentgateway`
//! itself is a `axum`/`tower` service, not a raw `net/http` one.

pub mod config;
pub mod error;
pub mod observations;
pub mod proxy;
pub mod router;
pub mod store;
pub mod tree;

pub use config::{Config, RawConfig};
pub use error::GatewayError;
pub use router::{AppState, build_router};
pub use store::Store;
