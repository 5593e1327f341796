//! Process-wide instrumentation handle: the service name, the ingest
//! backend's address, the shared HTTP client used for both record shipping
//! and dependency dispatch, and the background shipper task.
//!
//! The original SDK (`sdk/sdk.go`) keeps all of this as package-level
//! globals set once by `Init`. spec.md §9 calls that out as something a
//! reimplementation need not keep ("pass an explicit instrumentation handle
//! through handler registration; global state is not required by the
//! protocol") — so here it is an `Arc<Instrumentation>` threaded explicitly
//! into the inbound layer, the outbound client wrapper, and every
//! `Observer`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use record_core::{Id, Record, headers};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, event};

use crate::observation::ObservationPayload;

pub(crate) type HttpClient = Client<HttpConnector, Full<Bytes>>;

/// How often the shipper flushes, absent a size-triggered flush sooner.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
/// Flush immediately once this many records are buffered, rather than
/// waiting for the next tick. spec.md §9: "bound the in-process buffer and
/// flush on both size and time."
pub const DEFAULT_MAX_BATCH: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("request missing tracing context")]
    MissingContext,
    #[error("http error: {0}")]
    Http(#[from] hyper_util::client::legacy::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected backend status {0}")]
    BadStatus(u16),
}

/// A single process's handle onto the record/replay substrate: who it is,
/// where records ship to, and the machinery to do both.
pub struct Instrumentation {
    pub(crate) service_name: String,
    pub(crate) backend_host: String,
    pub(crate) proxy_host: String,
    pub(crate) client: HttpClient,
    /// Whether an inbound request that omits `X-Service-Debug` should still
    /// be treated as a replay (SPEC_FULL.md's "debug flag defaults"; set
    /// from `SdkConfig::debug_default`).
    pub(crate) debug_default: bool,
    sender: mpsc::UnboundedSender<Record>,
    cancel: CancellationToken,
}

impl Instrumentation {
    /// Construct the handle and spawn the background shipper task
    /// (`sdk/sdk.go`'s `processInBackground`), flushing every
    /// [`DEFAULT_FLUSH_INTERVAL`] or once [`DEFAULT_MAX_BATCH`] records have
    /// accumulated, whichever comes first.
    pub fn init(service_name: impl Into<String>, backend_host: impl Into<String>) -> Arc<Self> {
        Self::init_with(
            service_name,
            backend_host,
            DEFAULT_FLUSH_INTERVAL,
            DEFAULT_MAX_BATCH,
            false,
        )
    }

    pub fn init_with(
        service_name: impl Into<String>,
        backend_host: impl Into<String>,
        flush_interval: Duration,
        max_batch: usize,
        debug_default: bool,
    ) -> Arc<Self> {
        let backend_host = backend_host.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let instrumentation = Arc::new(Self {
            service_name: service_name.into(),
            proxy_host: format!("{backend_host}/runtime/proxy"),
            backend_host,
            client,
            debug_default,
            sender,
            cancel: cancel.clone(),
        });

        tokio::spawn(shipper_loop(
            instrumentation.clone(),
            receiver,
            flush_interval,
            max_batch,
            cancel,
        ));

        instrumentation
    }

    /// Enqueue a record for shipping. Never blocks the caller beyond the
    /// bounded cost of the channel send (spec.md §4.2: "must not block the
    /// emitting goroutine beyond a bounded enqueue").
    pub fn log(&self, record: Record) {
        // Closed receiver (post-`close`) just drops the record, matching the
        // original's fire-and-forget semantics.
        let _ = self.sender.send(record);
    }

    /// Stop the background shipper. In-flight POSTs are not awaited
    /// (spec.md §5).
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub(crate) fn client(&self) -> &HttpClient {
        &self.client
    }

    /// `GET /runtime/observations` for the current request context, honoring
    /// `pass`-overrides server-side (spec.md §4.6).
    pub(crate) async fn fetch_observations(
        &self,
        rc: &Id,
        debug_config: &str,
    ) -> Result<ObservationPayload, SdkError> {
        let uri: hyper::Uri = format!("{}/runtime/observations", self.backend_host).parse()?;
        let req = hyper::Request::builder()
            .method(hyper::Method::GET)
            .uri(uri)
            .header(headers::REQUEST_CONTEXT, rc.as_str())
            .header(headers::DEBUG_CONFIG, debug_config)
            .body(Full::new(Bytes::new()))
            .expect("request is well-formed");

        let resp = self.client.request(req).await?;
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map(|c| c.to_bytes())
            .unwrap_or_default();

        if !status.is_success() {
            event!(Level::DEBUG, %status, "observation fetch did not succeed");
            return Ok(ObservationPayload::default());
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

async fn shipper_loop(
    instrumentation: Arc<Instrumentation>,
    mut receiver: mpsc::UnboundedReceiver<Record>,
    flush_interval: Duration,
    max_batch: usize,
    cancel: CancellationToken,
) {
    let mut buffer: Vec<Record> = Vec::with_capacity(max_batch);
    let mut tick = tokio::time::interval(flush_interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return;
            }
            maybe = receiver.recv() => {
                match maybe {
                    Some(record) => {
                        buffer.push(record);
                        if buffer.len() >= max_batch {
                            flush(&instrumentation, std::mem::take(&mut buffer));
                        }
                    }
                    None => return,
                }
            }
            _ = tick.tick() => {
                if !buffer.is_empty() {
                    flush(&instrumentation, std::mem::take(&mut buffer));
                }
            }
        }
    }
}

/// Fire-and-forget POST of one batch. Network failures log locally and drop
/// the batch (spec.md §4.2, §7); the shipper loop itself must keep running.
fn flush(instrumentation: &Arc<Instrumentation>, batch: Vec<Record>) {
    let instrumentation = instrumentation.clone();
    tokio::spawn(async move {
        let body = match serde_json::to_vec(&batch) {
            Ok(b) => b,
            Err(err) => {
                event!(Level::WARN, %err, "unable to marshal record batch");
                return;
            }
        };
        let uri: hyper::Uri = match format!("{}/runtime/record", instrumentation.backend_host).parse() {
            Ok(u) => u,
            Err(err) => {
                event!(Level::WARN, %err, "invalid backend host");
                return;
            }
        };
        let req = hyper::Request::builder()
            .method(hyper::Method::POST)
            .uri(uri)
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .expect("request is well-formed");

        match instrumentation.client().request(req).await {
            Ok(resp) if resp.status() == hyper::StatusCode::ACCEPTED => {}
            Ok(resp) => {
                event!(Level::WARN, status = %resp.status(), "invalid status code received shipping records");
            }
            Err(err) => {
                event!(Level::WARN, %err, "unable to post record batch");
            }
        }
    });
}
