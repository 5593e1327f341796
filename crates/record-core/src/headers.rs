//! Propagation header names (spec.md §4.1). These are the wire contract
//! every instrumented service and the ingest backend agree on; keep them in
//! one place so the name literal only ever appears once.

/// `RC`; propagated unchanged hop to hop.
pub const REQUEST_CONTEXT: &str = "X-Request-Context";
/// `CC`; set by the caller to *its own* execution context.
pub const CAUSE_CONTEXT: &str = "X-Cause-Context";
/// `EC`; set by the caller as the fresh `DC` it minted for the callee.
pub const EXECUTE_CONTEXT: &str = "X-Execute-Context";
/// Literal `ENABLED` marks this hop as a replay; receivers must suppress
/// record emission.
pub const SERVICE_DEBUG: &str = "X-Service-Debug";
/// The pipe-separated `key=value` replay routing map.
pub const DEBUG_CONFIG: &str = "X-Debug-Config";
/// Caller's `GlobalDependencySequence` at the time of this call (debug only).
pub const DEPENDENCY_SEQUENCE: &str = "X-Dependency-Sequence";
/// Caller's URL-scoped dependency sequence at the time of this call (debug
/// only).
pub const SCOPED_DEPENDENCY_SEQUENCE: &str = "X-Scoped-Dependency-Sequence";

/// The only value `X-Service-Debug` ever takes when set.
pub const DEBUG_ENABLED: &str = "ENABLED";

/// Strip the query and fragment from a URL string, the scoping key used for
/// `ScopedDependencySequence` (spec.md §3) and for the per-observation-name
/// scoped sequence.
pub fn url_without_query(url: &str) -> &str {
    let end = url
        .find(['?', '#'])
        .unwrap_or(url.len());
    &url[..end]
}

#[cfg(test)]
mod tests {
    use super::url_without_query;

    #[test]
    fn strips_query() {
        assert_eq!(url_without_query("http://b/x?a=1"), "http://b/x");
    }

    #[test]
    fn strips_fragment() {
        assert_eq!(url_without_query("http://b/x#frag"), "http://b/x");
    }

    #[test]
    fn leaves_plain_url_alone() {
        assert_eq!(url_without_query("http://b/x"), "http://b/x");
    }
}
