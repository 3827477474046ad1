//! Binary ↔ text encoding for payloads stored inside JSON ledgers.
//!
//! Avatars are raw image bytes in memory and standard base64 (with padding)
//! on disk. The conversion happens only at the serde boundary: [`optional_bytes`]
//! is used as a `#[serde(with = ...)]` adapter, so nothing outside
//! serialization ever sees the text form.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Encode bytes as base64 text. Empty input encodes to an empty string.
pub fn encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode base64 text produced by [`encode`].
pub fn decode(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(text)
}

/// Serde adapter for `Option<Vec<u8>>` fields stored as base64 strings.
///
/// `None` serializes as JSON `null`; a missing key or `null` both
/// deserialize back to `None`. `Some(vec![])` is kept distinct as `""`.
pub mod optional_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_str(&super::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|t| super::decode(&t).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Holder {
        #[serde(default, with = "optional_bytes")]
        avatar: Option<Vec<u8>>,
    }

    #[test]
    fn roundtrip_empty() {
        assert_eq!(encode(&[]), "");
        assert_eq!(decode(&encode(&[])).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn roundtrip_every_byte_value() {
        let bytes: Vec<u8> = (0..=255u8).collect();
        assert_eq!(decode(&encode(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn roundtrip_lengths_around_padding() {
        for len in 0..8 {
            let bytes: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
            assert_eq!(decode(&encode(&bytes)).unwrap(), bytes, "len {len}");
        }
    }

    #[test]
    fn png_signature_encodes_as_expected() {
        let sig = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        assert_eq!(encode(&sig), "iVBORw0KGgo=");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode("not base64 at all!").is_err());
    }

    #[test]
    fn serde_none_and_empty_stay_distinct() {
        let none = serde_json::to_string(&Holder { avatar: None }).unwrap();
        let empty = serde_json::to_string(&Holder {
            avatar: Some(Vec::new()),
        })
        .unwrap();
        assert_eq!(none, r#"{"avatar":null}"#);
        assert_eq!(empty, r#"{"avatar":""}"#);

        let back_none: Holder = serde_json::from_str(&none).unwrap();
        let back_empty: Holder = serde_json::from_str(&empty).unwrap();
        assert_eq!(back_none.avatar, None);
        assert_eq!(back_empty.avatar, Some(Vec::new()));
    }

    #[test]
    fn serde_missing_key_is_none() {
        let h: Holder = serde_json::from_str("{}").unwrap();
        assert_eq!(h.avatar, None);
    }

    #[test]
    fn serde_invalid_base64_is_an_error() {
        let result: Result<Holder, _> = serde_json::from_str(r#"{"avatar":"%%%"}"#);
        assert!(result.is_err());
    }
}
