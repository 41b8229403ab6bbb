//! Strict decoder for analyst output.
//!
//! The reasoning endpoint is prompted for bare JSON but occasionally
//! wraps it in markdown fences. Fences are stripped deterministically,
//! the payload is serde-decoded into the wire shape, and range checks
//! turn it into a typed [`Assessment`]. Anything malformed is a typed
//! `DecodeError` the caller maps to the conservative fallback; raw
//! model output is never stored.

use serde::Deserialize;
use thiserror::Error;

use chainwatch_common::Severity;

use crate::analyst::Assessment;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema violation: {0}")]
    Schema(String),
}

/// Wire shape of the analyst response. Field names are part of the
/// prompt contract.
#[derive(Debug, Deserialize)]
struct RawAssessment {
    severity: String,
    impact_estimate: String,
    reasoning: String,
    mitigation_strategies: Vec<String>,
    confidence_score: f64,
}

/// Decode and validate an analyst response.
pub fn decode_assessment(raw: &str) -> Result<Assessment, DecodeError> {
    let body = strip_fences(raw);
    let parsed: RawAssessment = serde_json::from_str(body)?;

    let severity = Severity::from_str_loose(&parsed.severity)
        .ok_or_else(|| DecodeError::Schema(format!("unknown severity '{}'", parsed.severity)))?;

    if parsed.mitigation_strategies.is_empty() {
        return Err(DecodeError::Schema("empty mitigation list".to_string()));
    }
    if !(0.0..=100.0).contains(&parsed.confidence_score) {
        return Err(DecodeError::Schema(format!(
            "confidence {} out of [0,100]",
            parsed.confidence_score
        )));
    }

    Ok(Assessment {
        severity,
        impact_estimate: parsed.impact_estimate,
        rationale: parsed.reasoning,
        mitigations: parsed.mitigation_strategies,
        confidence: parsed.confidence_score,
    })
}

/// Strip a single surrounding markdown fence, with or without a
/// language tag. Anything else passes through untouched.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the language tag line if present ("json\n{...")
    match body.split_once('\n') {
        Some((first, tail)) if !first.trim_start().starts_with('{') => tail.trim(),
        _ => body.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "severity": "RED",
        "impact_estimate": "10-15% revenue at risk this quarter",
        "reasoning": "Fab shutdown overlaps with peak demand.",
        "mitigation_strategies": ["Qualify second source", "Expedite safety stock"],
        "confidence_score": 82
    }"#;

    #[test]
    fn decodes_bare_json() {
        let a = decode_assessment(VALID).unwrap();
        assert_eq!(a.severity, Severity::Red);
        assert_eq!(a.mitigations.len(), 2);
        assert_eq!(a.confidence, 82.0);
    }

    #[test]
    fn decodes_fenced_json() {
        let fenced = format!("```json\n{VALID}\n```");
        let a = decode_assessment(&fenced).unwrap();
        assert_eq!(a.severity, Severity::Red);
    }

    #[test]
    fn decodes_fence_without_language_tag() {
        let fenced = format!("```\n{VALID}\n```");
        assert!(decode_assessment(&fenced).is_ok());
    }

    #[test]
    fn severity_is_case_tolerant() {
        let body = VALID.replace("\"RED\"", "\" yellow \"");
        let a = decode_assessment(&body).unwrap();
        assert_eq!(a.severity, Severity::Yellow);
    }

    #[test]
    fn rejects_unknown_severity() {
        let body = VALID.replace("RED", "PURPLE");
        assert!(matches!(decode_assessment(&body), Err(DecodeError::Schema(_))));
    }

    #[test]
    fn rejects_empty_mitigations() {
        let body = VALID.replace(
            r#"["Qualify second source", "Expedite safety stock"]"#,
            "[]",
        );
        assert!(matches!(decode_assessment(&body), Err(DecodeError::Schema(_))));
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let body = VALID.replace("82", "140");
        assert!(matches!(decode_assessment(&body), Err(DecodeError::Schema(_))));
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            decode_assessment("the risk is severe, trust me"),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn rejects_missing_field() {
        let body = VALID.replace("\"reasoning\"", "\"analysis\"");
        assert!(matches!(decode_assessment(&body), Err(DecodeError::Json(_))));
    }

    #[test]
    fn unterminated_fence_passes_through_and_fails_json() {
        let raw = format!("```json\n{VALID}");
        assert!(decode_assessment(&raw).is_err());
    }
}
