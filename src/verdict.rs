//! Stage 3: turn the parsed payload into Approved / Rejected / Undetermined.

use crate::types::{ReconciliationReport, Verdict, VerdictPayload};

/// Minimum score for approval.
pub const APPROVAL_THRESHOLD: u8 = 70;

pub const PAYLOAD_MISSING_REASON: &str = "payload not found or malformed";

pub fn resolve(report: &ReconciliationReport) -> Verdict {
    match &report.parsed_payload {
        Some(payload) => resolve_payload(payload),
        None => Verdict::Undetermined(PAYLOAD_MISSING_REASON.to_string()),
    }
}

/// Approved only when the score clears the threshold and both sources agree.
/// Otherwise every failing condition contributes one reason, in fixed order.
pub fn resolve_payload(payload: &VerdictPayload) -> Verdict {
    let score_ok = payload.score >= APPROVAL_THRESHOLD;
    if score_ok && payload.products_match && payload.invoice_match {
        return Verdict::Approved;
    }

    let mut reasons = Vec::new();
    if !score_ok {
        reasons.push(format!("low score ({}%)", payload.score));
    }
    if !payload.products_match {
        reasons.push("products diverge".to_string());
    }
    if !payload.invoice_match {
        reasons.push("invoice diverges".to_string());
    }
    Verdict::Rejected(reasons)
}
