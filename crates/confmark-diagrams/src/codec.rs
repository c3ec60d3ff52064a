//! Transport token codec for diagram source text.
//!
//! Compresses diagram source with raw DEFLATE at the best ratio, then encodes
//! the compressed bytes with URL-safe unpadded base64. This is the `pako:`
//! token format accepted by the Mermaid rendering service and live editor,
//! and the `#R` fragment format accepted by diagrams.net.
//!
//! Encoding is deterministic: identical input always yields an identical
//! token, so service URLs built from tokens are stable.

use std::io::{Read, Write};

use base64::Engine;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

/// Diagram codec failure.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// Compression or decompression failure.
    #[error("deflate error: {0}")]
    Deflate(#[from] std::io::Error),

    /// Token is not valid URL-safe base64.
    #[error("invalid base64 token: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Encode diagram source into a transport token.
///
/// # Errors
///
/// Returns [`EncodingError::Deflate`] if compression fails.
pub fn encode(source: &str) -> Result<String, EncodingError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(source.as_bytes())?;
    let compressed = encoder.finish()?;
    let token = BASE64_URL_SAFE_NO_PAD.encode(compressed);
    tracing::trace!(source_len = source.len(), token_len = token.len(), "encoded diagram");
    Ok(token)
}

/// Decode a transport token back into diagram source.
///
/// Exact inverse of [`encode`]. Trailing `=` padding is tolerated so tokens
/// copied from padded-base64 producers still decode.
///
/// # Errors
///
/// Returns an error if the token is not valid base64, is not valid DEFLATE
/// data, or does not decompress to UTF-8 text.
pub fn decode(token: &str) -> Result<String, EncodingError> {
    let compressed = BASE64_URL_SAFE_NO_PAD.decode(token.trim_end_matches('='))?;
    let mut source = String::new();
    DeflateDecoder::new(compressed.as_slice()).read_to_string(&mut source)?;
    Ok(source)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_round_trip_simple() {
        let source = "graph TD\n    A --> B";
        assert_eq!(decode(&encode(source).unwrap()).unwrap(), source);
    }

    #[test]
    fn test_round_trip_unicode() {
        let source = "graph LR\n    A[\"日本語 ラベル\"] --> B[\"émojis 🎨\"]\n";
        assert_eq!(decode(&encode(source).unwrap()).unwrap(), source);
    }

    #[test]
    fn test_round_trip_quotes_and_newlines() {
        let source = "sequenceDiagram\n    Alice->>Bob: \"hi\"\n\n    Bob-->>Alice: 'ok'";
        assert_eq!(decode(&encode(source).unwrap()).unwrap(), source);
    }

    #[test]
    fn test_round_trip_empty() {
        assert_eq!(decode(&encode("").unwrap()).unwrap(), "");
    }

    #[test]
    fn test_deterministic() {
        let source = "graph TD\n    A --> B --> C";
        assert_eq!(encode(source).unwrap(), encode(source).unwrap());
    }

    #[test]
    fn test_token_alphabet_is_url_safe() {
        let token = encode("flowchart LR\n    Start --> Stop").unwrap();
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_decode_tolerates_padding() {
        let token = encode("graph TD\n    A --> B").unwrap();
        let padded = format!("{token}==");
        assert_eq!(decode(&padded).unwrap(), "graph TD\n    A --> B");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("not/base64!").is_err());
        // Valid base64, not valid deflate data.
        assert!(decode("AAAA").is_err());
    }
}
