//! ObjectCodec — the self-describing serialization pipeline every envelope
//! payload is encoded with, plus the optional LZ4 block compression.
//!
//! The wire representation is `serde_json`: additive schema evolution (new
//! optional fields, reordered fields) decodes cleanly, which a positional
//! format like `bincode` cannot offer. Compression, when requested, wraps
//! the JSON bytes with `lz4_flex`'s length-prefixed frame so decompression
//! needs no side channel for the original size.
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode payload: {0}")]
    Encode(String),
    #[error("failed to decode payload: {0}")]
    Decode(String),
    #[error("failed to decompress payload: {0}")]
    Decompress(String),
}

/// Result of [`encode`]: the wire bytes and whether they are LZ4-framed.
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub compressed: bool,
}

pub fn encode<T: Serialize>(value: &T, compress: bool) -> Result<Encoded, CodecError> {
    let json = serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))?;
    if compress {
        Ok(Encoded { bytes: lz4_flex::compress_prepend_size(&json), compressed: true })
    } else {
        Ok(Encoded { bytes: json, compressed: false })
    }
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8], compressed: bool) -> Result<T, CodecError> {
    let json = raw_json(bytes, compressed)?;
    decode_bounded(&json)
}

/// Recover the self-describing JSON bytes without deserializing into a
/// concrete type — used for payload extraction and CLI inspection where the
/// caller has no Rust type to bind.
pub fn raw_json(bytes: &[u8], compressed: bool) -> Result<Vec<u8>, CodecError> {
    if compressed {
        lz4_flex::decompress_size_prepended(bytes).map_err(|e| CodecError::Decompress(e.to_string()))
    } else {
        Ok(bytes.to_vec())
    }
}

/// Deserialize JSON with the recursion limit disabled and the call stack
/// grown on demand, so a deeply nested payload (at least 2048 levels, the
/// floor this crate commits to) cannot be rejected for exhausting a
/// hard-coded recursion budget, while a contrived pathological payload still
/// fails cleanly instead of overflowing the native stack.
fn decode_bounded<T: DeserializeOwned>(json: &[u8]) -> Result<T, CodecError> {
    let mut de = serde_json::Deserializer::from_slice(json);
    de.disable_recursion_limit();
    let de = serde_stacker::Deserializer::new(&mut de);
    T::deserialize(de).map_err(|e| CodecError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn round_trip_uncompressed() {
        let value = Sample { name: "widget".into(), count: 3 };
        let encoded = encode(&value, false).unwrap();
        assert!(!encoded.compressed);
        let decoded: Sample = decode(&encoded.bytes, false).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn round_trip_compressed() {
        let value = Sample { name: "gadget".repeat(50), count: 7 };
        let encoded = encode(&value, true).unwrap();
        assert!(encoded.compressed);
        let decoded: Sample = decode(&encoded.bytes, true).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn additive_field_is_ignored_on_decode() {
        let wire = serde_json::json!({ "name": "widget", "count": 3, "new_field": true });
        let bytes = serde_json::to_vec(&wire).unwrap();
        let decoded: Sample = decode(&bytes, false).unwrap();
        assert_eq!(decoded, Sample { name: "widget".into(), count: 3 });
    }

    #[test]
    fn deeply_nested_array_does_not_overflow() {
        let mut json = String::new();
        for _ in 0..4096 {
            json.push('[');
        }
        json.push_str("1");
        for _ in 0..4096 {
            json.push(']');
        }
        let value: serde_json::Value = decode(json.as_bytes(), false).unwrap();
        assert!(value.is_array());
    }
}
