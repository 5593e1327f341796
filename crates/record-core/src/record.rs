//! The `Record` wire struct (spec.md §3/§4.1). Field names are short and
//! stable on purpose — they're part of the external contract between
//! independently-deployed services and the ingest backend, so renaming one
//! is a breaking change to every participant, not a local refactor.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::codec::base64_bytes;
use crate::ids::{Id, empty_id};

/// A multi-valued header map, preserving insertion order (the order a
/// service actually set its headers in), mirroring Go's `map[string][]string`
/// plus iteration order since Go map order is undefined but ours isn't —
/// this is strictly more useful to a debugger inspecting a captured request.
pub type HeaderMap = IndexMap<String, Vec<String>>;

/// What a `Record` describes (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordType {
    Request,
    Response,
    DependencyRequest,
    DependencyResponse,
    Observed,
    /// Any `rt` value this build doesn't recognize, e.g. a record shipped
    /// by a newer service. Ingest still accepts the record (it isn't
    /// malformed JSON); the tree builder just has no case for it (spec.md
    /// §8 boundary behavior 10: "Unknown record type in buildTree is
    /// ignored, no panic").
    #[serde(other)]
    Unknown,
}

/// One flat record of something that happened during an execution: an
/// inbound request/response, an outbound dependency request/response, or an
/// internal observation. See spec.md §3 for the full invariant list these
/// must satisfy across a request's record set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "rc")]
    pub request_context: Id,
    #[serde(rename = "cc")]
    pub cause_context: Id,
    #[serde(rename = "ec")]
    pub execution_context: Id,
    #[serde(rename = "dc", default = "empty_id")]
    pub dependency_context: Id,

    #[serde(rename = "rt")]
    pub record_type: RecordType,

    #[serde(rename = "rm", default)]
    pub method: String,
    #[serde(rename = "tm", default = "epoch")]
    pub time: DateTime<Utc>,
    #[serde(rename = "dr", default)]
    pub duration_ms: i64,

    #[serde(rename = "dq", default)]
    pub dependency_sequence: i64,
    #[serde(rename = "sq", default)]
    pub scoped_sequence: i64,
    #[serde(rename = "oq", default)]
    pub observation_sequence: i64,

    #[serde(rename = "sn", default)]
    pub service_name: String,
    #[serde(rename = "on", default)]
    pub observation_name: String,

    #[serde(rename = "rh", default)]
    pub host: String,
    #[serde(rename = "ru", default)]
    pub uri: String,
    #[serde(rename = "he", default)]
    pub header: HeaderMap,
    #[serde(rename = "bd", default, with = "base64_bytes")]
    pub body: Vec<u8>,
    #[serde(rename = "oe", default, skip_serializing_if = "Option::is_none")]
    pub observation_error: Option<String>,

    #[serde(rename = "st", default)]
    pub status_code: u16,
}

/// Default for `tm` when a record omits it, matching Go's zero-value
/// `time.Time` (the Unix epoch) rather than rejecting the record — spec.md
/// §8 S1 posts a record with no `tm` and expects ingest to accept it.
fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(0, 0).unwrap()
}

impl Record {
    /// A record is about the edge execution iff its cause context equals its
    /// own request context (spec.md §3, §4.4 step 6, §8 S6).
    pub fn is_edge(&self) -> bool {
        self.record_type == RecordType::Request && self.cause_context == self.request_context
    }

    /// `None` unless this record is about an outbound call.
    pub fn dependency_context(&self) -> Option<&Id> {
        if self.dependency_context.is_empty() {
            None
        } else {
            Some(&self.dependency_context)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(rt: RecordType) -> Record {
        Record {
            request_context: Id::from("R"),
            cause_context: Id::from("R"),
            execution_context: Id::from("E"),
            dependency_context: empty_id(),
            record_type: rt,
            method: String::new(),
            time: Utc::now(),
            duration_ms: 0,
            dependency_sequence: 0,
            scoped_sequence: 0,
            observation_sequence: 0,
            service_name: "A".to_string(),
            observation_name: String::new(),
            host: String::new(),
            uri: "/x".to_string(),
            header: HeaderMap::new(),
            body: vec![],
            observation_error: None,
            status_code: 0,
        }
    }

    #[test]
    fn record_type_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&RecordType::DependencyRequest).unwrap(),
            "\"dependency-request\""
        );
        assert_eq!(
            serde_json::to_string(&RecordType::Observed).unwrap(),
            "\"observed\""
        );
    }

    #[test]
    fn short_keys_round_trip() {
        let r = base(RecordType::Request);
        let json = serde_json::to_value(&r).unwrap();
        for key in ["rc", "cc", "ec", "rt", "tm", "sn", "ru", "he", "bd", "st"] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back.request_context, r.request_context);
        assert_eq!(back.record_type, r.record_type);
    }

    #[test]
    fn edge_detection() {
        let r = base(RecordType::Request);
        assert!(r.is_edge());
        let mut child = base(RecordType::Request);
        child.cause_context = Id::from("E-parent");
        assert!(!child.is_edge());
    }

    #[test]
    fn unrecognized_record_type_deserializes_to_unknown() {
        let json = serde_json::json!({
            "rc": "R", "cc": "R", "ec": "E", "rt": "some-future-type",
            "tm": "2024-01-01T00:00:00Z"
        });
        let r: Record = serde_json::from_value(json).unwrap();
        assert_eq!(r.record_type, RecordType::Unknown);
    }

    #[test]
    fn dependency_context_none_when_absent() {
        let r = base(RecordType::DependencyRequest);
        assert!(r.dependency_context().is_none());
    }

    #[test]
    fn missing_optional_fields_default_on_decode() {
        let minimal = serde_json::json!({
            "rc": "R", "cc": "R", "ec": "E", "rt": "request", "tm": "2024-01-01T00:00:00Z"
        });
        let r: Record = serde_json::from_value(minimal).unwrap();
        assert_eq!(r.dependency_context, empty_id());
        assert_eq!(r.status_code, 0);
        assert!(r.header.is_empty());
    }

    #[test]
    fn missing_tm_defaults_to_epoch() {
        // spec.md §8 S1: the literal payload has no "tm" and must still
        // decode so ingest can accept it.
        let minimal = serde_json::json!({
            "rc": "R", "cc": "R", "ec": "E", "rt": "request", "sn": "A", "ru": "/x"
        });
        let r: Record = serde_json::from_value(minimal).unwrap();
        assert_eq!(r.time, epoch());
    }
}
