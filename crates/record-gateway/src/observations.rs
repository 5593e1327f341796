//! `GET /runtime/observations` (spec.md §4.6): build the
//! `{ data: { name -> { seq -> {body, error} } } }` payload from the stored
//! `observed` records for one `RC`, excluding any `service:observation`
//! pair the debug-config maps to `pass`.
//!
//! No Go equivalent survives in `original_source` (the retained
//! `observer.go` predates the fetch side), so this is built directly from
//! spec.md's endpoint contract.

use indexmap::IndexMap;
use record_core::{ObservationEntry, ObservationPayload, Record, RecordType, debug_config};

/// Build the observation payload for one `RC`'s records, honoring
/// `pass`-overrides from the caller's `X-Debug-Config` (spec.md §4.6).
pub fn build_observation_payload(records: &[Record], debug_config_value: &str) -> ObservationPayload {
    let mapping = debug_config::parse(debug_config_value);
    let mut data: IndexMap<String, IndexMap<i64, ObservationEntry>> = IndexMap::new();

    for record in records {
        if record.record_type != RecordType::Observed {
            continue;
        }
        let key = debug_config::observation_key(&record.service_name, &record.observation_name);
        if mapping
            .get(&key)
            .map(|v| debug_config::is_pass(v))
            .unwrap_or(false)
        {
            continue;
        }
        // The payload's inner key is the observation-scoped sequence (sq),
        // matching `record_sdk::Observer`'s lookup by `(name, scoped
        // sequence)` (spec.md §4.3 step 4) — not the global
        // `ObservationSequence` (oq), which only orders the tree's dense
        // `observations` array (spec.md §4.4 step 3/4).
        data.entry(record.observation_name.clone())
            .or_default()
            .insert(
                record.scoped_sequence,
                ObservationEntry {
                    body: record.body.clone(),
                    error: record.observation_error.clone(),
                },
            );
    }

    ObservationPayload { data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use record_core::Id;

    fn observed(service: &str, name: &str, seq: i64, body: Vec<u8>) -> Record {
        Record {
            request_context: Id::from("R"),
            cause_context: Id::from("R"),
            execution_context: Id::from("E"),
            dependency_context: record_core::ids::empty_id(),
            record_type: RecordType::Observed,
            method: String::new(),
            time: Utc::now(),
            duration_ms: 0,
            dependency_sequence: 0,
            scoped_sequence: seq,
            observation_sequence: seq,
            service_name: service.to_string(),
            observation_name: name.to_string(),
            host: String::new(),
            uri: String::new(),
            header: Default::default(),
            body,
            observation_error: None,
            status_code: 0,
        }
    }

    #[test]
    fn builds_payload_without_pass_directive() {
        // spec.md §8 S5, "without the pass directive" branch.
        let records = vec![observed("A", "clock", 0, vec![0x01, 0x02])];
        let payload = build_observation_payload(&records, "");
        assert_eq!(payload.lookup("clock", 0).unwrap().body, vec![0x01, 0x02]);
    }

    #[test]
    fn pass_directive_excludes_observation() {
        // spec.md §8 S5, "with a:clock=pass" branch.
        let records = vec![observed("A", "clock", 0, vec![0x01, 0x02])];
        let payload = build_observation_payload(&records, "a:clock=pass");
        assert!(payload.lookup("clock", 0).is_none());
        assert!(payload.data.is_empty());
    }

    #[test]
    fn ignores_non_observed_records() {
        let mut req = observed("A", "clock", 0, vec![]);
        req.record_type = RecordType::Request;
        let payload = build_observation_payload(&[req], "");
        assert!(payload.data.is_empty());
    }
}
