//! The thin binary wiring `record-gateway`'s library into a runnable
//! process: load config (file, if any, else defaults), install tracing,
//! and serve the four-endpoint HTTP surface (spec.md §6) on `:8080` by
//! default.
//!
//! Grounded on `agentgateway-app`'s `clap`-based binary wrapping the
//! library crate's config loader.

use std::sync::Arc;

use clap::Parser;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use record_core::logging;
use record_gateway::{AppState, RawConfig, Store, build_router};

#[derive(Parser, Debug)]
#[command(name = "record-gateway", about = "Record/replay ingest backend")]
struct Args {
    /// Path to a config file (JSON). Every field is optional; an absent
    /// file is equivalent to an empty one.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Overrides the config file's (or default) bind address.
    #[arg(long)]
    bind_addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let args = Args::parse();

    let mut raw = match &args.config {
        Some(path) => {
            let contents = fs_err::tokio::read_to_string(path).await?;
            serde_json::from_str::<RawConfig>(&contents)?
        }
        None => RawConfig::default(),
    };
    if let Some(bind_addr) = args.bind_addr {
        raw.bind_addr = Some(bind_addr);
    }
    let config = raw.into_config()?;

    let store = Arc::new(Store::new());
    let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
    let state = AppState::new(store, client).with_max_body_bytes(config.max_body_bytes);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "ingest backend listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
