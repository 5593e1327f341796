//! The four-endpoint HTTP surface of the ingest backend (spec.md §4.4/§6):
//! `POST /runtime/record`, `GET /runtime/replay`, `* /runtime/proxy`,
//! `GET /runtime/observations`, all on one port, sharing one [`AppState`].
//!
//! Grounded on the teacher's dependency on `axum`/`tower-http` (trace
//! layer) and on `examples/other_examples`/`adamtc007-ob-poc`'s
//! `axum::Router` + `State` handler style (the teacher's own
//! router-construction file wasn't retained in the pack).

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Json;
use axum::routing::{any, get, post};
use bytes::Bytes;
use record_core::{Id, Record, headers};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::config::DEFAULT_MAX_BODY_BYTES;
use crate::error::GatewayError;
use crate::observations::build_observation_payload;
use crate::proxy::{HttpClient, proxy_handler};
use crate::store::Store;
use crate::tree::{Request, build_tree, find_root_execution};

/// Shared state every handler runs against: the record store and the HTTP
/// client the proxy's live-forward path dispatches through.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub client: HttpClient,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(store: Arc<Store>, client: HttpClient) -> Self {
        Self {
            store,
            client,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

/// Build the router: one `axum::Router` carrying all four endpoints plus a
/// trace layer, matching the teacher's preference for `tower_http::trace`
/// over ad hoc request logging. A body-size cap (spec.md §5's optional
/// hardening point) is installed from `state.max_body_bytes`.
pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/runtime/record", post(record_handler))
        .route("/runtime/replay", get(replay_handler))
        .route("/runtime/proxy", any(proxy_handler))
        .route("/runtime/observations", get(observations_handler))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// `POST /runtime/record` (spec.md §4.4, §6): ingest a JSON array of
/// records. 400 on bad content-type, empty, or malformed body; 202 on
/// accept.
async fn record_handler(
    State(state): State<AppState>,
    req_headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, GatewayError> {
    let content_type = req_headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !content_type.starts_with("application/json") {
        return Err(GatewayError::BadRequest(
            "expected Content-Type: application/json".into(),
        ));
    }
    if body.is_empty() {
        return Err(GatewayError::BadRequest("empty request body".into()));
    }

    let records: Vec<Record> = serde_json::from_slice(&body)
        .map_err(|err| GatewayError::BadRequest(format!("malformed record batch: {err}")))?;

    // `[]` unmarshals successfully, loops zero times, and accepts — matching
    // `backend-runtime/backend.go`'s `recordHandler`, which has no
    // empty-batch check.
    state.store.insert(records);
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
struct ReplayQuery {
    #[serde(default)]
    rc: String,
}

/// `GET /runtime/replay?rc=<RC>` (spec.md §4.4 step 6, §6): reassemble and
/// return the request tree rooted at `rc`'s edge execution. 404 if `rc` is
/// unknown, 400 if missing.
async fn replay_handler(
    State(state): State<AppState>,
    Query(query): Query<ReplayQuery>,
) -> Result<Json<Request>, GatewayError> {
    if query.rc.is_empty() {
        return Err(GatewayError::BadRequest("missing rc query parameter".into()));
    }
    let rc = Id::from(query.rc);

    state
        .store
        .with_records(&rc, |records| {
            find_root_execution(records, &rc).map(|ec| build_tree(records, &ec))
        })
        .flatten()
        .map(Json)
        .ok_or(GatewayError::NotFound)
}

/// `GET /runtime/observations` (spec.md §4.6): return the observation map
/// for the `X-Request-Context` the caller carries, honoring
/// `X-Debug-Config`'s `pass` overrides. 404 if the RC is unknown.
async fn observations_handler(
    State(state): State<AppState>,
    req_headers: HeaderMap,
) -> Result<Json<record_core::ObservationPayload>, GatewayError> {
    let rc_value = req_headers
        .get(headers::REQUEST_CONTEXT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if rc_value.is_empty() {
        return Err(GatewayError::BadRequest(
            "missing X-Request-Context header".into(),
        ));
    }
    let debug_config_value = req_headers
        .get(headers::DEBUG_CONFIG)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let rc = Id::from(rc_value);
    state
        .store
        .with_records(&rc, |records| {
            build_observation_payload(records, debug_config_value)
        })
        .map(Json)
        .ok_or(GatewayError::NotFound)
}
