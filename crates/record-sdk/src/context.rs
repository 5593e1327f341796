//! `ServiceContext` — the per-execution state an inbound call carries
//! through its handler: the four correlation identifiers, the debug flag and
//! routing config, and the monotonic sequence counters that give every
//! outbound call and observation its position within this execution.
//!
//! Grounded on `sdk/context.go`'s `ServiceContext`. spec.md §5 states its
//! sequence counters are "mutated only by the handling thread for that
//! request (not shared across requests); therefore they require no
//! locking", and §9's "Concurrent map writes to scopedSequence" open
//! question notes the original doesn't guard them even under same-context
//! fan-out, suggesting implementations either document single-threaded
//! usage or guard the counters. We take the second option: the context is
//! held behind an `Arc` so handlers can thread it through `axum` extensions
//! and spawned tasks, which requires `Sync`, so the counters live behind a
//! `std::sync::Mutex` rather than a `RefCell`. Uncontended in the
//! documented (single execution, sequential use) case, it only changes the
//! fan-out misuse case from a data race to a well-ordered (if unspecified)
//! interleaving.

use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use indexmap::IndexMap;
use record_core::{Id, headers, new_id};

use crate::instrumentation::Instrumentation;
use crate::observation::ObservationPayload;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ContextError {
    /// A non-edge call arrived without the required `X-Cause-Context` /
    /// `X-Execute-Context` headers (spec.md §4.2 step 2).
    #[error("internal request missing context")]
    MissingContext,
}

type ObservationFuture = Shared<BoxFuture<'static, Arc<ObservationPayload>>>;

pub struct ServiceContext {
    pub request_context: Id,
    pub cause_context: Id,
    pub execution_context: Id,
    pub debug: bool,
    pub debug_config: String,
    pub(crate) instrumentation: Arc<Instrumentation>,

    dependency_sequence: Mutex<i64>,
    scoped_dependency_sequence: Mutex<IndexMap<String, i64>>,
    observation_sequence: Mutex<i64>,
    observation_scoped_sequence: Mutex<IndexMap<String, i64>>,
    observation_fetch: Option<ObservationFuture>,
}

impl ServiceContext {
    /// Build a context from the propagation headers of an inbound request.
    /// Mints RC/CC/EC when this is an edge request (`X-Request-Context`
    /// absent); otherwise requires CC and EC to be present.
    pub fn from_headers(
        incoming: &http::HeaderMap,
        instrumentation: Arc<Instrumentation>,
    ) -> Result<Self, ContextError> {
        let get = |name: &str| -> String {
            incoming
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string()
        };

        let mut rc = get(headers::REQUEST_CONTEXT);
        let mut cc = get(headers::CAUSE_CONTEXT);
        let mut ec = get(headers::EXECUTE_CONTEXT);
        // Absent `X-Service-Debug`, fall back to the service's own default
        // (SPEC_FULL.md's "debug flag defaults") rather than hard-coding
        // normal mode.
        let debug = match incoming.get(headers::SERVICE_DEBUG) {
            Some(_) => get(headers::SERVICE_DEBUG) == headers::DEBUG_ENABLED,
            None => instrumentation.debug_default,
        };
        let debug_config = get(headers::DEBUG_CONFIG);

        if rc.is_empty() {
            // Edge request: mint RC, CC := RC, and a fresh EC.
            let fresh_rc = new_id();
            rc = fresh_rc.to_string();
            cc = rc.clone();
            ec = new_id().to_string();
        } else if cc.is_empty() || ec.is_empty() {
            return Err(ContextError::MissingContext);
        }

        let request_context = Id::from(rc);
        let cause_context = Id::from(cc);
        let execution_context = Id::from(ec);

        let observation_fetch = debug.then(|| {
            spawn_observation_fetch(
                instrumentation.clone(),
                request_context.clone(),
                debug_config.clone(),
            )
        });

        Ok(Self {
            request_context,
            cause_context,
            execution_context,
            debug,
            debug_config,
            instrumentation,
            dependency_sequence: Mutex::new(0),
            scoped_dependency_sequence: Mutex::new(IndexMap::new()),
            observation_sequence: Mutex::new(0),
            observation_scoped_sequence: Mutex::new(IndexMap::new()),
            observation_fetch,
        })
    }

    /// Mint a fresh execution id, used as the `DependencyContext` handed to
    /// a callee.
    pub fn new_execution_id(&self) -> Id {
        new_id()
    }

    /// `GlobalDependencySequence` — monotonic over every outbound call this
    /// execution makes.
    pub fn next_dependency_sequence(&self) -> i64 {
        let mut seq = self.dependency_sequence.lock().unwrap();
        let value = *seq;
        *seq += 1;
        value
    }

    /// `ScopedDependencySequence` — monotonic scoped to the call's
    /// URL-without-query.
    pub fn next_scoped_dependency_sequence(&self, url: &str) -> i64 {
        let key = headers::url_without_query(url).to_string();
        let mut scoped = self.scoped_dependency_sequence.lock().unwrap();
        let entry = scoped.entry(key).or_insert(0);
        let value = *entry;
        *entry += 1;
        value
    }

    /// `ObservationSequence` — monotonic over every observation this
    /// execution records, regardless of name.
    pub fn next_observation_sequence(&self) -> i64 {
        let mut seq = self.observation_sequence.lock().unwrap();
        let value = *seq;
        *seq += 1;
        value
    }

    /// Per-`ObservationName` scoped sequence.
    pub fn next_observation_scoped_sequence(&self, name: &str) -> i64 {
        let mut scoped = self.observation_scoped_sequence.lock().unwrap();
        let entry = scoped.entry(name.to_string()).or_insert(0);
        let value = *entry;
        *entry += 1;
        value
    }

    /// Await the observation map fetched at handler entry (debug mode only).
    /// Returns an empty payload outside debug mode or on fetch failure.
    pub async fn observations(&self) -> Arc<ObservationPayload> {
        match &self.observation_fetch {
            Some(fut) => fut.clone().await,
            None => Arc::new(ObservationPayload::default()),
        }
    }
}

/// Launch the background observation GET immediately (spec.md §4.3's "the
/// service issues a background GET ... at the start of a debug-mode inbound
/// handler"), returning a `Shared` future any number of `Observe*` calls can
/// await lazily without re-issuing the request.
fn spawn_observation_fetch(
    instrumentation: Arc<Instrumentation>,
    rc: Id,
    debug_config: String,
) -> ObservationFuture {
    let handle = tokio::spawn(async move {
        instrumentation
            .fetch_observations(&rc, &debug_config)
            .await
            .unwrap_or_default()
    });
    async move { Arc::new(handle.await.unwrap_or_default()) }
        .boxed()
        .shared()
}
