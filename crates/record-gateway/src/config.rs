//! The ingest backend's config layer (SPEC_FULL.md's config expansion),
//! following the teacher's `RawConfig` -> `Config` split (`lib.rs`'s
//! `RawConfig`/`Config` pair): a partially-optional, `serde`-deserialized
//! raw form (a file, or nothing at all) validated and defaulted into the
//! `Config` the binary actually runs with.

use std::net::SocketAddr;

use serde::Deserialize;

/// Default bind address for the HTTP surface (spec.md §6: "Listens on
/// `:8080` by default").
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Default cap on a single record's buffered body. spec.md §5 calls this
/// out as optional hardening ("implementers MAY impose a size cap and
/// truncate with a marker; this is the single most obvious production
/// hardening point") — we impose one rather than buffer unboundedly.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// What a user may supply, from a config file; every field is optional and
/// falls back to a default.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawConfig {
    pub bind_addr: Option<String>,
    pub max_body_bytes: Option<usize>,
}

/// The validated, defaulted config the binary runs with.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub max_body_bytes: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid bind address {0:?}: {1}")]
    InvalidBindAddr(String, std::net::AddrParseError),
}

impl RawConfig {
    /// Validate and default this raw config into a runnable [`Config`].
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let bind_addr = match self.bind_addr {
            Some(addr) => addr
                .parse()
                .map_err(|err| ConfigError::InvalidBindAddr(addr, err))?,
            None => DEFAULT_BIND_ADDR
                .parse()
                .expect("default bind address is valid"),
        };
        Ok(Config {
            bind_addr,
            max_body_bytes: self.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        RawConfig::default()
            .into_config()
            .expect("default raw config is always valid")
    }
}
