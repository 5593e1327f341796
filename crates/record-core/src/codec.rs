//! Wire encodings shared by the `Record` struct.

/// (De)serialize a `Vec<u8>` as a base64 string, matching how Go's
/// `encoding/json` marshals a `[]byte` field: transparently, without the
/// caller opting in. `serde_json` has no such built-in, so we spell it out
/// via a `with` module (spec.md §4.1/§8 S5: `bd` is `"AQI="` for `[0x01,
/// 0x02]`).
pub mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD
            .decode(s.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// (De)serialize a `std::time::Duration` as whole milliseconds, the config
/// layer's duration representation (SPEC_FULL.md's config expansion; the
/// teacher's own `serdes.rs` duration helper wasn't retained in the pack,
/// so this is reimplemented directly against the field's natural unit —
/// the same `ms` spec.md §3 already uses for `Record::duration_ms`).
pub mod serde_dur {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::base64_bytes;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Wrapper(#[serde(with = "base64_bytes")] Vec<u8>);

    #[test]
    fn round_trips_and_matches_go_encoding() {
        let w = Wrapper(vec![0x01, 0x02]);
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, "\"AQI=\"");
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.0, vec![0x01, 0x02]);
    }

    #[test]
    fn empty_body_round_trips() {
        let w = Wrapper(vec![]);
        let json = serde_json::to_string(&w).unwrap();
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.0, Vec::<u8>::new());
    }
}
