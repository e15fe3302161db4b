use chardetng::EncodingDetector;
use encoding_rs::Encoding;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("failed to decode bytes as {encoding}")]
    DecodeFailure { encoding: String },
}

/// Decode a small text file into UTF-8: BOM first, then strict UTF-8, then chardetng.
///
/// Trigger files are written by hand on all kinds of machines, so a
/// Windows-1252 or UTF-16 file is as likely as plain UTF-8.
pub fn decode_text(bytes: &[u8]) -> Result<String, DecodeError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return decode_with(&bytes[bom_len..], encoding);
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_string());
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    decode_with(bytes, detector.guess(None, true))
}

fn decode_with(bytes: &[u8], enc: &'static Encoding) -> Result<String, DecodeError> {
    let (text, had_errors) = enc.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(DecodeError::DecodeFailure {
            encoding: enc.name().to_string(),
        });
    }
    Ok(text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::decode_text;

    #[test]
    fn strips_utf8_bom() {
        let bytes = b"\xEF\xBB\xBFsource_sas_url: x";
        assert_eq!(decode_text(bytes).unwrap(), "source_sas_url: x");
    }

    #[test]
    fn decodes_utf16le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "key: v".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_text(&bytes).unwrap(), "key: v");
    }

    #[test]
    fn falls_back_to_detection_for_legacy_bytes() {
        // "café" in Windows-1252
        let text = decode_text(b"# caf\xE9\nkey: v").unwrap();
        assert!(text.ends_with("key: v"));
        assert!(text.contains("caf"));
    }
}
