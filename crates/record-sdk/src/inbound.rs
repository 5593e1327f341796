//! The inbound wrapper (spec.md §4.2): builds a [`ServiceContext`] from the
//! propagation headers, buffers and restores the request body, emits
//! `request`/`response` records unless replaying, and echoes the
//! correlation identifiers back to the caller.
//!
//! Grounded on `sdk/handlefunc.go`'s `WithAudit` and `sdk/responsewritter.go`.
//! Reimplemented as a [`tower::Layer`] over any `Service<Request<Body>>`
//! (the seam `axum::Router::layer` expects), rather than Go's manual
//! `http.HandleFunc` wrapping — axum/tower give us a compositional
//! middleware instead of a closure that has to remember to call the real
//! handler.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use bytes::Bytes;
use chrono::Utc;
use futures_util::future::BoxFuture;
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::BodyExt;
use indexmap::IndexMap;
use record_core::{Record, RecordType, headers};
use tower::{Layer, Service};

use crate::context::ServiceContext;
use crate::instrumentation::Instrumentation;

/// Installs audit instrumentation on every request passing through the
/// layered service.
#[derive(Clone)]
pub struct AuditLayer {
    instrumentation: Arc<Instrumentation>,
}

impl AuditLayer {
    pub fn new(instrumentation: Arc<Instrumentation>) -> Self {
        Self { instrumentation }
    }
}

impl<S> Layer<S> for AuditLayer {
    type Service = AuditService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuditService {
            inner,
            instrumentation: self.instrumentation.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuditService<S> {
    inner: S,
    instrumentation: Arc<Instrumentation>,
}

impl<S> Service<Request<Body>> for AuditService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response<Body>, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Clone-and-swap is the standard tower trick for making a
        // `&mut self` service callable from a `'static` boxed future.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let instrumentation = self.instrumentation.clone();

        Box::pin(async move {
            let start = Instant::now();
            let started_at = Utc::now();
            let method = req.method().to_string();
            let uri = req.uri().to_string();
            let host = req
                .headers()
                .get(http::header::HOST)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();

            let ctx = match ServiceContext::from_headers(req.headers(), instrumentation.clone()) {
                Ok(ctx) => Arc::new(ctx),
                Err(_) => {
                    return Ok(bad_request());
                }
            };

            // spec.md §4.2 step 4: buffer the request body for recording,
            // then restore it so the real handler sees it unchanged.
            let (parts, body) = req.into_parts();
            let body_bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(_) => Bytes::new(),
            };
            let mut req = Request::from_parts(parts, Body::from(body_bytes.clone()));
            req.extensions_mut().insert(ctx.clone());

            if !ctx.debug {
                emit_request_record(
                    &instrumentation,
                    &ctx,
                    &method,
                    &host,
                    &uri,
                    header_snapshot(req.headers()),
                    body_bytes.to_vec(),
                    started_at,
                );
            }

            let result = inner.call(req).await;

            let duration_ms = start.elapsed().as_millis() as i64;

            match result {
                Ok(mut resp) => {
                    // spec.md §4.2 step 3b: echo RC/CC/EC back to the
                    // caller.
                    let resp_headers = resp.headers_mut();
                    resp_headers.insert(
                        headers::REQUEST_CONTEXT,
                        HeaderValue::from_str(&ctx.request_context).unwrap_or(HeaderValue::from_static("")),
                    );
                    resp_headers.insert(
                        headers::CAUSE_CONTEXT,
                        HeaderValue::from_str(&ctx.cause_context).unwrap_or(HeaderValue::from_static("")),
                    );
                    resp_headers.insert(
                        headers::EXECUTE_CONTEXT,
                        HeaderValue::from_str(&ctx.execution_context).unwrap_or(HeaderValue::from_static("")),
                    );

                    if !ctx.debug {
                        let status = resp.status();
                        let (parts, resp_body) = resp.into_parts();
                        let resp_bytes = match resp_body.collect().await {
                            Ok(collected) => collected.to_bytes(),
                            Err(_) => Bytes::new(),
                        };
                        let header_snap = header_snapshot(&parts.headers);
                        emit_response_record(
                            &instrumentation,
                            &ctx,
                            &method,
                            &host,
                            &uri,
                            header_snap,
                            resp_bytes.to_vec(),
                            status.as_u16(),
                            started_at,
                            duration_ms,
                        );
                        resp = Response::from_parts(parts, Body::from(resp_bytes));
                    }

                    Ok(resp)
                }
                Err(err) => Err(err),
            }
        })
    }
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

fn bad_request() -> Response<Body> {
    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .body(Body::from("Invalid context"))
        .expect("static response is well-formed")
}

#[allow(clippy::too_many_arguments)]
fn emit_request_record(
    instrumentation: &Arc<Instrumentation>,
    ctx: &ServiceContext,
    method: &str,
    host: &str,
    uri: &str,
    header: IndexMap<String, Vec<String>>,
    body: Vec<u8>,
    time: chrono::DateTime<Utc>,
) {
    instrumentation.log(Record {
        request_context: ctx.request_context.clone(),
        cause_context: ctx.cause_context.clone(),
        execution_context: ctx.execution_context.clone(),
        dependency_context: record_core::ids::empty_id(),
        record_type: RecordType::Request,
        method: method.to_string(),
        time,
        duration_ms: 0,
        dependency_sequence: 0,
        scoped_sequence: 0,
        observation_sequence: 0,
        service_name: instrumentation.service_name().to_string(),
        observation_name: String::new(),
        host: host.to_string(),
        uri: uri.to_string(),
        header,
        body,
        observation_error: None,
        status_code: 0,
    });
}

#[allow(clippy::too_many_arguments)]
fn emit_response_record(
    instrumentation: &Arc<Instrumentation>,
    ctx: &ServiceContext,
    method: &str,
    host: &str,
    uri: &str,
    header: IndexMap<String, Vec<String>>,
    body: Vec<u8>,
    status_code: u16,
    time: chrono::DateTime<Utc>,
    duration_ms: i64,
) {
    instrumentation.log(Record {
        request_context: ctx.request_context.clone(),
        cause_context: ctx.cause_context.clone(),
        execution_context: ctx.execution_context.clone(),
        dependency_context: record_core::ids::empty_id(),
        record_type: RecordType::Response,
        method: method.to_string(),
        time,
        duration_ms,
        dependency_sequence: 0,
        scoped_sequence: 0,
        observation_sequence: 0,
        service_name: instrumentation.service_name().to_string(),
        observation_name: String::new(),
        host: host.to_string(),
        uri: uri.to_string(),
        header,
        body,
        observation_error: None,
        status_code,
    });
}
