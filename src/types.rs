use std::fmt;

use serde::{Deserialize, Serialize};

/// Which of the two photos an image is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageRole {
    Package,
    Invoice,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRole::Package => f.write_str("package"),
            ImageRole::Invoice => f.write_str("invoice"),
        }
    }
}

/// Free-text description of one image, as returned by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub role: ImageRole,
    pub raw_text: String,
    /// File name the image came from, when it came from disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Structured verdict block the model appends to its reconciliation reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictPayload {
    pub score: u8,
    #[serde(rename = "produtos_match")]
    pub products_match: bool,
    #[serde(rename = "nota_match")]
    pub invoice_match: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Full model reply, kept verbatim for display and export.
    pub raw_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_payload: Option<VerdictPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum Verdict {
    Approved,
    Rejected(Vec<String>),
    Undetermined(String),
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Approved => f.write_str("APPROVED"),
            Verdict::Rejected(reasons) if reasons.is_empty() => f.write_str("REJECTED"),
            Verdict::Rejected(reasons) => write!(f, "REJECTED ({})", reasons.join(", ")),
            Verdict::Undetermined(reason) => write!(f, "MANUAL REVIEW REQUIRED ({})", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_display() {
        assert_eq!(Verdict::Approved.to_string(), "APPROVED");
        assert_eq!(
            Verdict::Rejected(vec!["low score (50%)".into(), "invoice diverges".into()]).to_string(),
            "REJECTED (low score (50%), invoice diverges)"
        );
        assert_eq!(
            Verdict::Undetermined("payload not found or malformed".into()).to_string(),
            "MANUAL REVIEW REQUIRED (payload not found or malformed)"
        );
    }

    #[test]
    fn payload_uses_wire_field_names() {
        let payload = VerdictPayload {
            score: 90,
            products_match: true,
            invoice_match: false,
        };
        let json = serde_json::to_value(payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"score": 90, "produtos_match": true, "nota_match": false})
        );
    }
}
