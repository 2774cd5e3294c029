//! Label payloads as submitted by clients.
//!
//! Each label in a batch arrives as its own JSON document. Parsing is purely
//! structural: both classifier fields must be present and be polarity values.

use serde::{Deserialize, Serialize};

use crate::error::LabelParseError;
use crate::types::Polarity;

/// One label from a client batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelPayload {
    pub intent_label: Polarity,
    pub abuse_label: Polarity,
    /// Position the client believes this label takes in its stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_index: Option<i64>,
}

impl LabelPayload {
    pub fn new(intent_label: Polarity, abuse_label: Polarity) -> Self {
        Self {
            intent_label,
            abuse_label,
            sequence_index: None,
        }
    }

    pub fn with_index(mut self, sequence_index: i64) -> Self {
        self.sequence_index = Some(sequence_index);
        self
    }

    /// Encode as the JSON document a client sends.
    pub fn to_wire(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Parse every label of a batch, failing on the first malformed one.
///
/// Nothing is returned unless the whole batch parses, so callers never
/// commit part of a batch.
pub fn parse_batch<S: AsRef<str>>(raw: &[S]) -> Result<Vec<LabelPayload>, LabelParseError> {
    raw.iter()
        .enumerate()
        .map(|(position, doc)| {
            serde_json::from_str(doc.as_ref()).map_err(|e| LabelParseError {
                position,
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_boolean_labels() {
        let batch = parse_batch(&[r#"{"intent_label":true,"abuse_label":false}"#]).unwrap();
        assert_eq!(
            batch,
            vec![LabelPayload::new(Polarity::Positive, Polarity::Negative)]
        );
    }

    #[test]
    fn test_parse_declared_index() {
        let batch =
            parse_batch(&[r#"{"intent_label":"NEGATIVE","abuse_label":"POSITIVE","sequence_index":4}"#])
                .unwrap();
        assert_eq!(batch[0].sequence_index, Some(4));
    }

    #[test]
    fn test_malformed_label_reports_position() {
        let err = parse_batch(&[
            r#"{"intent_label":true,"abuse_label":true}"#,
            r#"{"intent_label":true}"#,
        ])
        .unwrap_err();
        assert_eq!(err.position, 1);

        let err = parse_batch(&["not json"]).unwrap_err();
        assert_eq!(err.position, 0);
    }

    #[test]
    fn test_wire_encoding_parses_back() {
        let label = LabelPayload::new(Polarity::Negative, Polarity::Negative).with_index(7);
        let parsed = parse_batch(&[label.to_wire()]).unwrap();
        assert_eq!(parsed, vec![label]);
    }
}
