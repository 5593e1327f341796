//! The `X-Debug-Config` grammar (spec.md §6): `entry (| entry)*` where
//! `entry := key '=' value`. Keys are service names, or `service:observation`
//! pairs whose value is the literal `pass`. Unparseable entries (no `=`, or
//! more than one `=`) are silently dropped, matching
//! `backend-runtime/backend.go`'s `parseDebugConfig`.

use indexmap::IndexMap;

/// The literal value marking an observation as "do not inject".
pub const PASS: &str = "pass";

/// Parse a `X-Debug-Config` header value into a lower-cased key -> value map.
pub fn parse(config: &str) -> IndexMap<String, String> {
    let mut map = IndexMap::new();
    for entry in config.split('|') {
        if entry.is_empty() {
            continue;
        }
        let parts: Vec<&str> = entry.split('=').collect();
        if parts.len() != 2 {
            continue;
        }
        map.insert(parts[0].to_lowercase(), parts[1].to_string());
    }
    map
}

/// Serialize a routing map back into the `key=value|key=value` wire form,
/// for the SDK (which re-attaches the config on every debug-mode outbound
/// call) and the CLI-equivalent driver code.
pub fn format(map: &IndexMap<String, String>) -> String {
    map.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("|")
}

/// `true` if `value` is mapped to the literal `pass` directive, case
/// insensitively.
pub fn is_pass(value: &str) -> bool {
    value.eq_ignore_ascii_case(PASS)
}

/// The observation-map lookup key: `service:observation`, lower-cased.
pub fn observation_key(service_name: &str, observation_name: &str) -> String {
    format!(
        "{}:{}",
        service_name.to_lowercase(),
        observation_name.to_lowercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_entries() {
        let m = parse("b=localhost:9000|c=example.com:9001");
        assert_eq!(m.get("b").map(String::as_str), Some("localhost:9000"));
        assert_eq!(m.get("c").map(String::as_str), Some("example.com:9001"));
    }

    #[test]
    fn lower_cases_keys() {
        let m = parse("B=localhost:9000");
        assert_eq!(m.get("b").map(String::as_str), Some("localhost:9000"));
    }

    #[test]
    fn drops_unparseable_entries() {
        let m = parse("nosign|a=1=2|b=2|");
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn empty_string_parses_empty() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn observation_pass_directive() {
        let m = parse("a:clock=pass");
        assert_eq!(
            m.get(&observation_key("A", "clock")).map(String::as_str),
            Some("pass")
        );
        assert!(is_pass(m.get("a:clock").unwrap()));
    }

    #[test]
    fn format_round_trips_through_parse() {
        let mut m = IndexMap::new();
        m.insert("b".to_string(), "localhost:9000".to_string());
        let formatted = format(&m);
        assert_eq!(parse(&formatted), m);
    }
}
