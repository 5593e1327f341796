//! The SDK's config layer (SPEC_FULL.md's config expansion): what an
//! embedding service supplies, beyond just calling [`crate::Instrumentation::init`]
//! with a couple of string arguments — the service's name, the ingest
//! backend's base URL, and the shipper's flush cadence / batch bound.
//!
//! Follows the same `RawConfig` -> `Config` split the teacher's `lib.rs`
//! uses: a fully-optional, `serde`-deserialized raw form (a file, env, or
//! nothing) validated and defaulted into the `Config` the SDK actually runs
//! with.

use std::time::Duration;

use serde::Deserialize;

use crate::instrumentation::{DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_BATCH, Instrumentation};

/// What an embedding service may supply, typically from its own config
/// file. `service_name` and `backend_host` have no sensible default (spec.md
/// §4.2: every record is tagged with the service's identity), so they are
/// required; the shipper's cadence and debug default are not.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawConfig {
    pub service_name: String,
    pub backend_host: String,
    #[serde(default, with = "serde_dur_option")]
    pub flush_interval: Option<Duration>,
    #[serde(default)]
    pub max_batch: Option<usize>,
    /// Whether this service instance runs with `X-Debug-Config` enabled by
    /// default, absent an explicit override on the inbound request
    /// (spec.md §4.2: debug mode is normally opted into per-request, but a
    /// service may want to default it on in a staging environment).
    #[serde(default)]
    pub debug_default: bool,
}

/// The validated, defaulted config the SDK runs with.
#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,
    pub backend_host: String,
    pub flush_interval: Duration,
    pub max_batch: usize,
    pub debug_default: bool,
}

impl RawConfig {
    /// Default and validate this raw config into a runnable [`Config`].
    /// Infallible: every optional field has a default and the required
    /// fields are plain strings with no further grammar to reject.
    pub fn into_config(self) -> Config {
        Config {
            service_name: self.service_name,
            backend_host: self.backend_host,
            flush_interval: self.flush_interval.unwrap_or(DEFAULT_FLUSH_INTERVAL),
            max_batch: self.max_batch.unwrap_or(DEFAULT_MAX_BATCH),
            debug_default: self.debug_default,
        }
    }
}

impl Config {
    /// Build the `Instrumentation` handle this config describes, spawning
    /// the background shipper the same way [`Instrumentation::init_with`]
    /// does. `debug_default` flows straight through to
    /// `ServiceContext::from_headers`, which falls back to it when an
    /// inbound request omits `X-Service-Debug`.
    pub fn into_instrumentation(self) -> std::sync::Arc<Instrumentation> {
        Instrumentation::init_with(
            self.service_name,
            self.backend_host,
            self.flush_interval,
            self.max_batch,
            self.debug_default,
        )
    }
}

/// Like [`record_core::codec::serde_dur`], but for the `Option<Duration>`
/// shape `RawConfig::flush_interval` needs (absent vs. explicit zero are
/// distinct in a config file).
mod serde_dur_option {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis: Option<u64> = Option::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_flush_interval_and_batch_when_omitted() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"serviceName": "checkout", "backendHost": "http://backend:8080"}"#,
        )
        .unwrap();
        let config = raw.into_config();
        assert_eq!(config.service_name, "checkout");
        assert_eq!(config.backend_host, "http://backend:8080");
        assert_eq!(config.flush_interval, DEFAULT_FLUSH_INTERVAL);
        assert_eq!(config.max_batch, DEFAULT_MAX_BATCH);
        assert!(!config.debug_default);
    }

    #[test]
    fn honors_explicit_overrides() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "serviceName": "checkout",
                "backendHost": "http://backend:8080",
                "flushInterval": 1500,
                "maxBatch": 10,
                "debugDefault": true
            }"#,
        )
        .unwrap();
        let config = raw.into_config();
        assert_eq!(config.flush_interval, Duration::from_millis(1500));
        assert_eq!(config.max_batch, 10);
        assert!(config.debug_default);
    }
}
