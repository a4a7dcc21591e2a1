// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Chart request validator.
//!
//! Gates every send on:
//! - recipient address shape (`local@domain.tld`)
//! - presence of image data
//! - encoded and estimated decoded size ceilings
//! - strict standard base64
//!
//! Nothing here performs I/O; the same input always yields the same result.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Maximum length of the base64 string after any data-URL prefix is removed.
pub const MAX_ENCODED_LEN: usize = 6 * 1024 * 1024;

/// Maximum estimated size of the decoded image.
pub const MAX_DECODED_LEN: usize = 5 * 1024 * 1024;

/// Attachment name used when the caller does not supply one.
pub const DEFAULT_FILENAME: &str = "chart.png";

/// Body of `POST /send-chart`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChartRequest {
    pub to: String,
    #[serde(default)]
    pub filename: Option<String>,
    pub data: String,
}

impl ChartRequest {
    /// Attachment filename, falling back to [`DEFAULT_FILENAME`].
    pub fn filename(&self) -> &str {
        match self.filename.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => DEFAULT_FILENAME,
        }
    }
}

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid recipient")]
    InvalidRecipient,

    #[error("no image data")]
    MissingData,

    #[error("image too large")]
    PayloadTooLarge,

    #[error("invalid base64")]
    InvalidEncoding,
}

/// Validate a chart request and decode its image.
pub fn validate_and_decode(request: &ChartRequest) -> Result<Vec<u8>, ValidationError> {
    if !is_valid_recipient(&request.to) {
        debug!(to = %request.to, "Recipient rejected");
        return Err(ValidationError::InvalidRecipient);
    }

    if request.data.is_empty() {
        return Err(ValidationError::MissingData);
    }

    let encoded = strip_data_url(&request.data);
    check_size(encoded)?;

    STANDARD.decode(encoded).map_err(|err| {
        debug!(error = %err, "Base64 decode failed");
        ValidationError::InvalidEncoding
    })
}

/// Check an address against `^[^\s@]+@[^\s@]+\.[^\s@]+$`.
pub fn is_valid_recipient(address: &str) -> bool {
    if address.chars().any(is_pattern_space) {
        return false;
    }

    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') {
        return false;
    }

    // Some dot must have at least one character on either side.
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Characters matched by `\s` in the address pattern.
///
/// `char::is_whitespace` follows the Unicode `White_Space` property, which
/// leaves out the information separators U+001C..=U+001F; `\s` on text
/// includes them.
fn is_pattern_space(c: char) -> bool {
    c.is_whitespace() || matches!(c, '\u{1c}'..='\u{1f}')
}

/// Remove a `data:...,` prefix.
///
/// Everything through the first comma is dropped. A `data:` string without
/// any comma is returned unchanged.
pub fn strip_data_url(data: &str) -> &str {
    if !data.starts_with("data:") {
        return data;
    }
    match data.split_once(',') {
        Some((_, payload)) => payload,
        None => data,
    }
}

/// Estimated decoded size: `floor(len * 3 / 4)`.
pub fn estimated_decoded_len(encoded_len: usize) -> usize {
    encoded_len.saturating_mul(3) / 4
}

fn check_size(encoded: &str) -> Result<(), ValidationError> {
    // Ceilings are in characters, not UTF-8 bytes.
    let len = encoded.chars().count();
    if len > MAX_ENCODED_LEN {
        debug!(len, limit = MAX_ENCODED_LEN, "Encoded payload over limit");
        return Err(ValidationError::PayloadTooLarge);
    }

    let estimated = estimated_decoded_len(len);
    if estimated > MAX_DECODED_LEN {
        debug!(estimated, limit = MAX_DECODED_LEN, "Decoded payload over limit");
        return Err(ValidationError::PayloadTooLarge);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(to: &str, data: &str) -> ChartRequest {
        ChartRequest {
            to: to.to_string(),
            filename: None,
            data: data.to_string(),
        }
    }

    #[test]
    fn test_recipient_shapes() {
        assert!(is_valid_recipient("a@b.c"));
        assert!(is_valid_recipient("user@example.com"));
        assert!(is_valid_recipient("first.last+tag@mail.example.co.uk"));
        assert!(is_valid_recipient("a@b..c"));

        assert!(!is_valid_recipient("a@b"));
        assert!(!is_valid_recipient("a b@c.d"));
        assert!(!is_valid_recipient("ab@c.d "));
        assert!(!is_valid_recipient("@b.c"));
        assert!(!is_valid_recipient("a@.c"));
        assert!(!is_valid_recipient("a@b."));
        assert!(!is_valid_recipient("a@b@c.d"));
        assert!(!is_valid_recipient("example.com"));
        assert!(!is_valid_recipient(""));
    }

    #[test]
    fn test_information_separators_count_as_space() {
        for sep in ['\u{1c}', '\u{1d}', '\u{1e}', '\u{1f}'] {
            let address = format!("a{}b@c.d", sep);
            assert!(!is_valid_recipient(&address), "{:?}", address);
        }
        assert!(!is_valid_recipient("a@b.c\u{a0}"));
        assert!(!is_valid_recipient("a\tb@c.d"));
    }

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_url("AAAA"), "AAAA");
        assert_eq!(strip_data_url("data:image/png;base64"), "data:image/png;base64");
        // Only the first comma is significant.
        assert_eq!(strip_data_url("data:x,AA,BB"), "AA,BB");
        // Prefix must be at the very start.
        assert_eq!(strip_data_url("xdata:,AAAA"), "xdata:,AAAA");
    }

    #[test]
    fn test_decodes_plain_and_prefixed_payloads() {
        let plain = request("user@example.com", "aGVsbG8=");
        assert_eq!(validate_and_decode(&plain).unwrap(), b"hello");

        let prefixed = request("user@example.com", "data:image/png;base64,aGVsbG8=");
        assert_eq!(validate_and_decode(&prefixed).unwrap(), b"hello");
    }

    #[test]
    fn test_data_prefix_without_comma_is_not_stripped() {
        let req = request("user@example.com", "data:aGVsbG8=");
        assert_eq!(
            validate_and_decode(&req),
            Err(ValidationError::InvalidEncoding)
        );
    }

    #[test]
    fn test_recipient_checked_first() {
        let req = request("not-an-address", "!!!");
        assert_eq!(
            validate_and_decode(&req),
            Err(ValidationError::InvalidRecipient)
        );
    }

    #[test]
    fn test_empty_data_rejected() {
        let req = request("user@example.com", "");
        assert_eq!(validate_and_decode(&req), Err(ValidationError::MissingData));
    }

    #[test]
    fn test_malformed_base64_rejected() {
        for bad in ["aGVsbG8", "aGVsbG8==", "aGV*bG8=", "a GVsbG8=", "aGVsbG9="] {
            let req = request("user@example.com", bad);
            assert_eq!(
                validate_and_decode(&req),
                Err(ValidationError::InvalidEncoding),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_encoded_ceiling_checked_before_decode() {
        // Not valid base64 either, but size wins.
        let req = request("user@example.com", &"!".repeat(MAX_ENCODED_LEN + 1));
        assert_eq!(
            validate_and_decode(&req),
            Err(ValidationError::PayloadTooLarge)
        );
    }

    #[test]
    fn test_multibyte_payload_measured_in_characters() {
        // 4 Mi characters but 8 MiB of UTF-8: under the ceiling, so it reaches decode.
        let req = request("user@example.com", &"é".repeat(4 * 1024 * 1024));
        assert_eq!(
            validate_and_decode(&req),
            Err(ValidationError::InvalidEncoding)
        );

        let req = request("user@example.com", &"é".repeat(MAX_ENCODED_LEN + 1));
        assert_eq!(
            validate_and_decode(&req),
            Err(ValidationError::PayloadTooLarge)
        );
    }

    #[test]
    fn test_prefix_does_not_count_toward_ceiling() {
        let payload = "A".repeat(MAX_ENCODED_LEN - 4 * 1024);
        let data = format!("data:image/png;base64,{}", payload);
        let req = request("user@example.com", &data);
        // Passes the size checks and decodes (length is a multiple of 4).
        assert!(validate_and_decode(&req).is_ok());
    }

    #[test]
    fn test_decoded_estimate() {
        assert_eq!(estimated_decoded_len(0), 0);
        assert_eq!(estimated_decoded_len(4), 3);
        assert_eq!(estimated_decoded_len(5), 3);
        assert_eq!(estimated_decoded_len(MAX_ENCODED_LEN), 4_718_592);
        assert!(estimated_decoded_len(MAX_ENCODED_LEN) <= MAX_DECODED_LEN);
    }

    #[test]
    fn test_default_filename() {
        let mut req = request("user@example.com", "aGVsbG8=");
        assert_eq!(req.filename(), DEFAULT_FILENAME);

        req.filename = Some(String::new());
        assert_eq!(req.filename(), DEFAULT_FILENAME);

        req.filename = Some("q3.png".to_string());
        assert_eq!(req.filename(), "q3.png");
    }

    #[test]
    fn test_validation_is_repeatable() {
        let good = request("user@example.com", "data:image/png;base64,aGVsbG8=");
        assert_eq!(validate_and_decode(&good), validate_and_decode(&good));

        let bad = request("user@example.com", "%%%%");
        assert_eq!(validate_and_decode(&bad), validate_and_decode(&bad));
    }
}
