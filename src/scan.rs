//! Scan decoding: camera detections to trip tokens.

use serde::Deserialize;
use std::fmt;

/// Opaque identifier carried by a stop's QR code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TripToken(String);

impl TripToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TripToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One detection result from a scan surface.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub raw_value: String,
    /// Symbology reported by the scanner (e.g. "qr_code"); informational
    #[serde(default)]
    pub format: Option<String>,
}

impl Detection {
    pub fn new(raw_value: impl Into<String>) -> Self {
        Self {
            raw_value: raw_value.into(),
            format: None,
        }
    }
}

/// Take the first detection's payload as a token.
///
/// Empty input or a blank payload yields `None`; this is the normal idle
/// state. The payload is otherwise passed through verbatim.
pub fn decode_scan(detections: &[Detection]) -> Option<TripToken> {
    let first = detections.first()?;
    if first.raw_value.trim().is_empty() {
        return None;
    }
    Some(TripToken(first.raw_value.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_detection_wins_verbatim() {
        let detections = [Detection::new(" stop-7 "), Detection::new("stop-8")];
        assert_eq!(decode_scan(&detections).unwrap().as_str(), " stop-7 ");
    }

    #[test]
    fn test_empty_and_blank_payloads_are_idle() {
        assert_eq!(decode_scan(&[]), None);
        assert_eq!(decode_scan(&[Detection::new("")]), None);
        assert_eq!(decode_scan(&[Detection::new(" \t\n")]), None);
        // Only the first result is considered.
        assert_eq!(
            decode_scan(&[Detection::new(""), Detection::new("stop-8")]),
            None
        );
    }

    #[test]
    fn test_detection_from_scanner_json() {
        let detection: Detection =
            serde_json::from_str(r#"{"rawValue":"9f1c","format":"qr_code"}"#).unwrap();
        assert_eq!(detection.raw_value, "9f1c");
        assert_eq!(detection.format.as_deref(), Some("qr_code"));
    }
}
