// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire payload assembly.
//!
//! A batch is sent as a JSON array whose elements are the raw records, in
//! insertion order:
//!
//! ```json
//! [{"message":"Log entry 1"},{"message":"Log entry 2"}]
//! ```
//!
//! An empty batch is sent as `[]`.

use crate::errors::FlushError;
use std::io::Write;
use zstd::stream::write::Encoder;

/// Joins records into `[r1,r2,...]` with no trailing comma.
#[must_use]
pub fn build_payload(records: &[Vec<u8>]) -> Vec<u8> {
    let size = records.iter().map(Vec::len).sum::<usize>() + records.len() + 2;
    let mut buffer = Vec::with_capacity(size);

    buffer.push(b'[');
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            buffer.push(b',');
        }
        buffer.extend_from_slice(record);
    }
    buffer.push(b']');

    buffer
}

/// Builds the request body for a batch, zstd-compressed when a level is given.
pub fn encode_payload(
    records: &[Vec<u8>],
    compression_level: Option<i32>,
) -> Result<Vec<u8>, FlushError> {
    let payload = build_payload(records);
    match compression_level {
        Some(level) => compress(&payload, level).map_err(FlushError::Payload),
        None => Ok(payload),
    }
}

fn compress(data: &[u8], level: i32) -> std::io::Result<Vec<u8>> {
    let mut encoder = Encoder::new(Vec::new(), level)?;
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn records(items: &[&str]) -> Vec<Vec<u8>> {
        items.iter().map(|s| s.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_empty_batch() {
        assert_eq!(build_payload(&[]), b"[]");
    }

    #[test]
    fn test_single_record() {
        assert_eq!(build_payload(&records(&[r#"{"a":1}"#])), br#"[{"a":1}]"#);
    }

    #[test]
    fn test_no_trailing_comma() {
        assert_eq!(build_payload(&records(&["a", "b", "c"])), b"[a,b,c]");
    }

    #[test]
    fn test_records_are_copied_verbatim() {
        let payload = build_payload(&records(&["{\"m\":\"x\"}\n", " 1 "]));
        assert_eq!(payload, b"[{\"m\":\"x\"}\n, 1 ]");
    }

    #[test]
    fn test_encode_without_compression() {
        let payload = encode_payload(&records(&["1", "2"]), None).unwrap();
        assert_eq!(payload, b"[1,2]");
    }

    #[test]
    fn test_encode_with_compression_round_trips() {
        let input = records(&[r#"{"message":"compress me"}"#, r#"{"message":"me too"}"#]);
        let compressed = encode_payload(&input, Some(3)).unwrap();
        assert_ne!(compressed, build_payload(&input));

        let mut decoder = zstd::stream::read::Decoder::new(&compressed[..]).unwrap();
        let mut decompressed = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut decompressed).unwrap();
        assert_eq!(decompressed, build_payload(&input));
    }

    proptest! {
        #[test]
        fn payload_of_json_records_is_a_json_array(values in proptest::collection::vec(any::<i64>(), 0..40)) {
            let input: Vec<Vec<u8>> = values
                .iter()
                .map(|v| serde_json::to_vec(&serde_json::json!({ "v": v })).unwrap())
                .collect();
            let payload = build_payload(&input);
            let parsed: Vec<serde_json::Value> = serde_json::from_slice(&payload).unwrap();
            prop_assert_eq!(parsed.len(), values.len());
            for (value, expected) in parsed.iter().zip(values.iter()) {
                prop_assert_eq!(value["v"].as_i64(), Some(*expected));
            }
        }
    }
}
