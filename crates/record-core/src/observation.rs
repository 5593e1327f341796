//! The payload shape returned by `GET /runtime/observations` (spec.md
//! §4.6): `{ data: { name -> { seq -> {body, error} } } }`. Shared between
//! `record-gateway` (which builds it from the stored `observed` records) and
//! `record-sdk` (which decodes it on the fetch side) so the wire shape only
//! has one definition.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::codec::base64_bytes;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationEntry {
    #[serde(rename = "bd", default, with = "base64_bytes")]
    pub body: Vec<u8>,
    #[serde(rename = "oe", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationPayload {
    #[serde(default)]
    pub data: IndexMap<String, IndexMap<i64, ObservationEntry>>,
}

impl ObservationPayload {
    pub fn lookup(&self, name: &str, seq: i64) -> Option<&ObservationEntry> {
        self.data.get(name)?.get(&seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_matches_spec_s5() {
        let json = serde_json::json!({"data": {"clock": {"0": {"bd": "AQI="}}}});
        let payload: ObservationPayload = serde_json::from_value(json).unwrap();
        let entry = payload.lookup("clock", 0).unwrap();
        assert_eq!(entry.body, vec![0x01, 0x02]);
        assert!(entry.error.is_none());
    }

    #[test]
    fn empty_payload_serializes_to_empty_data() {
        let payload = ObservationPayload::default();
        assert_eq!(serde_json::to_string(&payload).unwrap(), r#"{"data":{}}"#);
    }
}
