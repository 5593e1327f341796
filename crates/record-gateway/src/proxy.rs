//! The replay proxy (spec.md §4.5): given a debug-mode service's outbound
//! call, decide whether to forward it live to a mapped host (rewriting
//! propagation headers onto the recorded child's identifiers) or answer it
//! from the recorded snapshot.
//!
//! Grounded on `backend-runtime/backend.go`'s `proxyHandler`. The live
//! dispatch uses the same `hyper_util` legacy client style as
//! `record-sdk`'s outbound transport (`record_sdk::outbound`), trimmed to a
//! single unpooled request since the proxy has no long-lived connection to
//! maintain.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Response, StatusCode};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use indexmap::IndexMap;
use record_core::{Id, Record, RecordType, debug_config, headers};
use serde::Deserialize;

use crate::error::GatewayError;
use crate::router::AppState;

/// The replay proxy's live-forward client: a single unpooled
/// `hyper_util` legacy client, matching `record-sdk`'s outbound transport
/// style (`record_sdk::instrumentation::HttpClient`) rather than carrying
/// its own connection-pooling machinery.
pub type HttpClient = Client<HttpConnector, Full<Bytes>>;

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    #[serde(rename = "ref")]
    reference: String,
}

pub async fn proxy_handler(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response<Body>, GatewayError> {
    let rc = required_header(&headers, headers::REQUEST_CONTEXT)?;
    let cc = required_header(&headers, headers::CAUSE_CONTEXT)?;
    let seq: i64 = required_header(&headers, headers::SCOPED_DEPENDENCY_SEQUENCE)?
        .parse()
        .map_err(|_| GatewayError::BadRequest("invalid X-Scoped-Dependency-Sequence".into()))?;
    let debug_config_value = headers
        .get(headers::DEBUG_CONFIG)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let rc = Id::from(rc);
    let cc = Id::from(cc);
    let reference = query.reference.clone();

    let (dep_response, dep_inbound_request) = state
        .store
        .with_records(&rc, |records| find_dependency(records, &cc, &reference, seq))
        .ok_or(GatewayError::NotFound)?;

    // spec.md §7: "no recorded dependency-response matching (EC, uri, seq)"
    // is the signal that replay has diverged from the recorded execution.
    let dep_response = dep_response.ok_or(GatewayError::DependencyMiss)?;

    let mapping = debug_config::parse(&debug_config_value);
    let live_target = dep_inbound_request.as_ref().and_then(|depinreq| {
        mapping
            .get(&depinreq.service_name.to_lowercase())
            .cloned()
            .map(|host| (depinreq, host))
    });

    match live_target {
        Some((dep_inbound_request, host)) => {
            live_forward(
                &state,
                method,
                &reference,
                &host,
                dep_inbound_request,
                &debug_config_value,
                body,
            )
            .await
        }
        None => Ok(snapshot_response(&dep_response)),
    }
}

/// `depRes`: the `dependency-response` this proxy call is authoritative for
/// (spec.md §4.5 step 2). `depInReq`: the `request` record describing how
/// the child execution was originally entered (step 3), absent when the
/// callee was uninstrumented.
fn find_dependency(
    records: &[Record],
    cc: &Id,
    reference: &str,
    seq: i64,
) -> (Option<Record>, Option<Record>) {
    let dep_response = records
        .iter()
        .find(|r| {
            r.record_type == RecordType::DependencyResponse
                && &r.execution_context == cc
                && r.uri == reference
                && r.scoped_sequence == seq
        })
        .cloned();

    let dep_inbound_request = dep_response.as_ref().and_then(|dep_res| {
        records
            .iter()
            .find(|r| r.record_type == RecordType::Request && r.execution_context == dep_res.dependency_context)
            .cloned()
    });

    (dep_response, dep_inbound_request)
}

/// Snapshot-replay: answer straight from the recorded `dependency-response`,
/// no network call (spec.md §4.5 "No match" branch).
fn snapshot_response(dep_response: &Record) -> Response<Body> {
    let mut builder = Response::builder().status(
        StatusCode::from_u16(dep_response.status_code).unwrap_or(StatusCode::OK),
    );
    builder = apply_first_value_headers(builder, &dep_response.header);
    builder
        .body(Body::from(dep_response.body.clone()))
        .expect("response with validated status/headers is well-formed")
}

/// Live-forward: dispatch to the mapped host with propagation headers
/// rewritten onto the recorded child's identifiers (spec.md §4.5 "Match"
/// branch).
async fn live_forward(
    state: &AppState,
    method: Method,
    original_url: &str,
    host: &str,
    dep_inbound_request: &Record,
    debug_config_value: &str,
    body: Bytes,
) -> Result<Response<Body>, GatewayError> {
    let mut url = url::Url::parse(original_url)
        .map_err(|err| GatewayError::Internal(format!("invalid recorded url: {err}")))?;

    let (host_part, port) = match host.split_once(':') {
        Some((h, p)) => (h, p.parse::<u16>().ok()),
        None => (host, None),
    };
    url.set_host(Some(host_part))
        .map_err(|err| GatewayError::Internal(format!("invalid mapped host: {err}")))?;
    let _ = url.set_port(port);
    // spec.md §4.5: "localhost" is the one case that stays plaintext.
    let scheme = if host.starts_with("localhost") { "http" } else { "https" };
    url.set_scheme(scheme)
        .map_err(|_| GatewayError::Internal("unable to set scheme".into()))?;

    let mut req = hyper::Request::builder()
        .method(method.as_str())
        .uri(url.as_str())
        .body(Full::new(body))
        .map_err(|err| GatewayError::Internal(format!("unable to build forwarded request: {err}")))?;

    // Copy the recorded child's headers first-value-per-name (spec.md §4.5
    // step 4), then *override* the four propagation headers rather than
    // append to them — `depInReq.header` already snapshotted the values this
    // child originally received (`record_sdk::inbound` echoes every inbound
    // header), so appending would send each ID header twice.
    let req_headers = req.headers_mut();
    for (name, values) in dep_inbound_request.header.iter() {
        let Some(value) = values.first() else { continue };
        let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::from_str(value),
        ) else {
            continue;
        };
        req_headers.insert(name, value);
    }
    req_headers.insert(
        HeaderName::try_from(headers::REQUEST_CONTEXT).expect("valid header name"),
        HeaderValue::from_str(&dep_inbound_request.request_context).unwrap_or(HeaderValue::from_static("")),
    );
    req_headers.insert(
        HeaderName::try_from(headers::CAUSE_CONTEXT).expect("valid header name"),
        HeaderValue::from_str(&dep_inbound_request.cause_context).unwrap_or(HeaderValue::from_static("")),
    );
    req_headers.insert(
        HeaderName::try_from(headers::EXECUTE_CONTEXT).expect("valid header name"),
        HeaderValue::from_str(&dep_inbound_request.execution_context).unwrap_or(HeaderValue::from_static("")),
    );
    req_headers.insert(
        HeaderName::try_from(headers::SERVICE_DEBUG).expect("valid header name"),
        HeaderValue::from_static(headers::DEBUG_ENABLED),
    );
    req_headers.insert(
        HeaderName::try_from(headers::DEBUG_CONFIG).expect("valid header name"),
        HeaderValue::from_str(debug_config_value).unwrap_or(HeaderValue::from_static("")),
    );

    let resp = state
        .client
        .request(req)
        .await
        .map_err(|err| GatewayError::Internal(format!("live-forward dispatch failed: {err}")))?;

    let status = resp.status();
    let header = header_snapshot(resp.headers());
    // spec.md §9: "use a length-agnostic full-body read" rather than the
    // original's `Content-Length`-gated read, which silently drops chunked
    // bodies of unknown length.
    let body = resp
        .into_body()
        .collect()
        .await
        .map(|c| c.to_bytes())
        .unwrap_or_default();

    let mut builder = Response::builder().status(status);
    builder = apply_first_value_headers(builder, &header);
    Ok(builder
        .body(Body::from(body))
        .expect("response with validated status/headers is well-formed"))
}

fn required_header(headers: &HeaderMap, name: &str) -> Result<String, GatewayError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GatewayError::BadRequest(format!("missing {name}")))
}

fn header_snapshot(headers: &http::HeaderMap) -> IndexMap<String, Vec<String>> {
    let mut map: IndexMap<String, Vec<String>> = IndexMap::new();
    for (name, value) in headers.iter() {
        if let Ok(v) = value.to_str() {
            map.entry(name.to_string()).or_default().push(v.to_string());
        }
    }
    map
}

fn apply_first_value_headers(
    mut builder: axum::http::response::Builder,
    header: &IndexMap<String, Vec<String>>,
) -> axum::http::response::Builder {
    for (name, values) in header.iter() {
        if let Some(value) = values.first() {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }
    builder
}
