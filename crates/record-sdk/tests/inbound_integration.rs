//! Exercises `AuditLayer` against a real in-process `axum` server, playing
//! the role of "an instrumented service" the way `record-sdk` itself has no
//! shipped example binary to test against (SPEC_FULL.md's test tooling
//! note).

use axum::Router;
use axum::routing::get;
use record_core::headers;
use record_sdk::{AuditLayer, Instrumentation};
use tokio::net::TcpListener;

async fn spawn_app() -> (std::net::SocketAddr, std::sync::Arc<Instrumentation>) {
    let instrumentation = Instrumentation::init("service-a", "http://127.0.0.1:1");
    let layer = AuditLayer::new(instrumentation.clone());
    let app = Router::new()
        .route("/hello", get(|| async { "hi" }))
        .layer(layer);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .unwrap();
    });
    (addr, instrumentation)
}

#[tokio::test]
async fn edge_request_gets_context_headers_echoed_back() {
    let (addr, _instrumentation) = spawn_app().await;
    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/hello"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let rc = resp
        .headers()
        .get(headers::REQUEST_CONTEXT)
        .expect("RC header echoed")
        .to_str()
        .unwrap()
        .to_string();
    let cc = resp
        .headers()
        .get(headers::CAUSE_CONTEXT)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(rc, cc, "edge request: CC must equal RC");
    assert!(resp.headers().get(headers::EXECUTE_CONTEXT).is_some());
    assert_eq!(resp.text().await.unwrap(), "hi");
}

#[tokio::test]
async fn non_edge_request_missing_context_is_rejected() {
    let (addr, _instrumentation) = spawn_app().await;
    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/hello"))
        .header(headers::REQUEST_CONTEXT, "R")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn propagated_context_is_preserved() {
    let (addr, _instrumentation) = spawn_app().await;
    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/hello"))
        .header(headers::REQUEST_CONTEXT, "R")
        .header(headers::CAUSE_CONTEXT, "E1")
        .header(headers::EXECUTE_CONTEXT, "E2")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()
            .get(headers::REQUEST_CONTEXT)
            .unwrap()
            .to_str()
            .unwrap(),
        "R"
    );
    assert_eq!(
        resp.headers()
            .get(headers::EXECUTE_CONTEXT)
            .unwrap()
            .to_str()
            .unwrap(),
        "E2"
    );
}
