//! The outbound transport wrapper (spec.md §4.2): allocates the dependency's
//! sequence numbers, mints its execution context, and either dispatches
//! live (recording both sides) or rewrites the call to the replay proxy
//! (debug mode).
//!
//! Grounded on `sdk/roundtripper.go`'s `Transport.RoundTrip`. Built on
//! `hyper_util`'s legacy client the way `agentgateway`'s own `client/mod.rs`
//! wraps `hyper_util::client::legacy::Client`, trimmed of the HBONE/mTLS/
//! connection-pool machinery this spec has no use for — every dependency
//! call here is a single in-memory-buffered request/response, not a
//! long-lived tunnel.

use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use http_body_util::{BodyExt, Full};
use indexmap::IndexMap;
use record_core::{Id, Record, RecordType, headers};

use crate::context::ServiceContext;
use crate::instrumentation::SdkError;

/// A fully-buffered outbound response: status, first-value-per-name
/// headers preserved as a multi-map, and body bytes.
#[derive(Debug, Clone)]
pub struct InstrumentedResponse {
    pub status: u16,
    pub header: IndexMap<String, Vec<String>>,
    pub body: Bytes,
}

/// An HTTP client wrapper that attaches propagation headers to every
/// outbound call and either records it (normal mode) or rewrites it onto
/// the replay proxy (debug mode).
#[derive(Clone)]
pub struct ReplayClient;

impl ReplayClient {
    pub fn new() -> Self {
        Self
    }

    /// Issue one outbound dependency call on behalf of `ctx`.
    ///
    /// `url`/`method`/`header`/`body` describe the call the instrumented
    /// service wants to make; this wrapper owns sequence allocation, header
    /// injection, the debug-mode URL rewrite, and record emission. The
    /// caller never talks to the network directly once instrumented.
    pub async fn call(
        &self,
        ctx: &ServiceContext,
        method: http::Method,
        url: url::Url,
        mut header: IndexMap<String, Vec<String>>,
        body: Bytes,
    ) -> Result<InstrumentedResponse, SdkError> {
        let gsq = ctx.next_dependency_sequence();
        let ssq = ctx.next_scoped_dependency_sequence(url.as_str());
        let dep_ec: Id = ctx.new_execution_id();

        header.insert(
            headers::REQUEST_CONTEXT.to_string(),
            vec![ctx.request_context.to_string()],
        );
        header.insert(
            headers::CAUSE_CONTEXT.to_string(),
            vec![ctx.execution_context.to_string()],
        );
        header.insert(
            headers::EXECUTE_CONTEXT.to_string(),
            vec![dep_ec.to_string()],
        );

        let original_url = url.to_string();
        let dispatch_url = if ctx.debug {
            header.insert(
                headers::SERVICE_DEBUG.to_string(),
                vec![headers::DEBUG_ENABLED.to_string()],
            );
            header.insert(
                headers::DEBUG_CONFIG.to_string(),
                vec![ctx.debug_config.clone()],
            );
            header.insert(
                headers::DEPENDENCY_SEQUENCE.to_string(),
                vec![gsq.to_string()],
            );
            header.insert(
                headers::SCOPED_DEPENDENCY_SEQUENCE.to_string(),
                vec![ssq.to_string()],
            );

            let mut proxy_url = url::Url::parse(&ctx.instrumentation.proxy_host)?;
            proxy_url.query_pairs_mut().append_pair("ref", &original_url);
            proxy_url
        } else {
            url.clone()
        };

        let start = Instant::now();
        let started_at = Utc::now();
        let host = dispatch_url.host_str().unwrap_or("").to_string();

        if !ctx.debug {
            emit_dependency_record(
                ctx,
                RecordType::DependencyRequest,
                &dep_ec,
                gsq,
                ssq,
                &method,
                &host,
                &original_url,
                header.clone(),
                body.to_vec(),
                0,
                started_at,
                0,
            );
        }

        let mut builder = hyper::Request::builder()
            .method(method.as_str())
            .uri(dispatch_url.as_str());
        for (name, values) in header.iter() {
            for value in values {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        let req = builder
            .body(Full::new(body))
            .map_err(|_| SdkError::MissingContext)?;

        let dispatch_result = ctx.instrumentation.client().request(req).await;
        let duration_ms = start.elapsed().as_millis() as i64;

        let resp = match dispatch_result {
            Ok(resp) => resp,
            Err(err) => {
                if !ctx.debug {
                    emit_dependency_record(
                        ctx,
                        RecordType::DependencyResponse,
                        &dep_ec,
                        gsq,
                        ssq,
                        &method,
                        &host,
                        &original_url,
                        IndexMap::new(),
                        vec![],
                        0,
                        started_at,
                        duration_ms,
                    );
                }
                return Err(SdkError::Http(err));
            }
        };

        let status = resp.status().as_u16();
        let resp_header = header_snapshot(resp.headers());
        let resp_body = resp
            .into_body()
            .collect()
            .await
            .map(|c| c.to_bytes())
            .unwrap_or_default();

        if !ctx.debug {
            emit_dependency_record(
                ctx,
                RecordType::DependencyResponse,
                &dep_ec,
                gsq,
                ssq,
                &method,
                &host,
                &original_url,
                resp_header.clone(),
                resp_body.to_vec(),
                status,
                started_at,
                duration_ms,
            );
        }

        Ok(InstrumentedResponse {
            status,
            header: resp_header,
            body: resp_body,
        })
    }
}

impl Default for ReplayClient {
    fn default() -> Self {
        Self::new()
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

#[allow(clippy::too_many_arguments)]
fn emit_dependency_record(
    ctx: &ServiceContext,
    record_type: RecordType,
    dep_ec: &Id,
    gsq: i64,
    ssq: i64,
    method: &http::Method,
    host: &str,
    uri: &str,
    header: IndexMap<String, Vec<String>>,
    body: Vec<u8>,
    status_code: u16,
    time: chrono::DateTime<Utc>,
    duration_ms: i64,
) {
    ctx.instrumentation.log(Record {
        request_context: ctx.request_context.clone(),
        cause_context: ctx.cause_context.clone(),
        execution_context: ctx.execution_context.clone(),
        dependency_context: dep_ec.clone(),
        record_type,
        method: method.to_string(),
        time,
        duration_ms,
        dependency_sequence: gsq,
        scoped_sequence: ssq,
        observation_sequence: 0,
        service_name: ctx.instrumentation.service_name().to_string(),
        observation_name: String::new(),
        host: host.to_string(),
        uri: uri.to_string(),
        header,
        body,
        observation_error: None,
        status_code,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ServiceContext;
    use crate::instrumentation::Instrumentation;
    use std::sync::Arc;

    fn ctx(instrumentation: Arc<Instrumentation>) -> ServiceContext {
        ServiceContext::from_headers(&http::HeaderMap::new(), instrumentation).unwrap()
    }

    #[tokio::test]
    async fn dependency_sequence_allocated_before_dispatch() {
        // No live server needed: this just exercises sequence allocation,
        // which must happen (and be observable) before the network call is
        // attempted (spec.md §4.2's ordering guarantee).
        let instrumentation = Instrumentation::init("svc-a", "http://127.0.0.1:1");
        let c = ctx(instrumentation);
        assert_eq!(c.next_dependency_sequence(), 0);
        assert_eq!(c.next_scoped_dependency_sequence("http://b/x"), 0);
    }
}
