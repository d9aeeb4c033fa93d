//! Text decoding with optional encoding inference

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use std::borrow::Cow;

use super::strategy::HandlerError;

/// Look up an encoding by its WHATWG label (`utf8`, `latin1`, `windows-1252`, ...)
pub fn lookup(label: &str) -> Result<&'static Encoding, HandlerError> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| HandlerError::UnknownEncoding(label.to_string()))
}

/// Strict decode: malformed input yields `None`, never replacement characters
pub(crate) fn decode(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
}

/// Decode a whole resource, failing with `Decode` on malformed input
pub(crate) fn decode_strict(
    bytes: &[u8],
    encoding: &'static Encoding,
    location: &str,
) -> Result<String, HandlerError> {
    decode(bytes, encoding).ok_or_else(|| HandlerError::Decode {
        location: location.to_string(),
        encoding: encoding.name(),
    })
}

/// Decode with the configured encoding, falling back to a detected one
pub(crate) fn decode_or_infer(
    bytes: &[u8],
    encoding: &'static Encoding,
    member: &str,
) -> Result<String, HandlerError> {
    if let Some(text) = decode(bytes, encoding) {
        return Ok(text);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let inferred = detector.guess(None, true);

    tracing::warn!(
        member,
        configured = encoding.name(),
        inferred = inferred.name(),
        "Decode failed, retrying with inferred encoding"
    );

    retry_with(bytes, encoding, inferred, member)
}

fn retry_with(
    bytes: &[u8],
    configured: &'static Encoding,
    inferred: &'static Encoding,
    member: &str,
) -> Result<String, HandlerError> {
    if inferred == configured {
        return Err(HandlerError::EncodingIndeterminate {
            member: member.to_string(),
        });
    }

    decode(bytes, inferred).ok_or_else(|| HandlerError::EncodingIndeterminate {
        member: member.to_string(),
    })
}
