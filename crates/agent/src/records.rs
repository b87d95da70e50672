//! Typed records exchanged between the role agents and the engine.
//!
//! Every record a backend produces is decoded strictly: unknown or missing
//! fields, confidences outside `[0, 1]` and empty step lists are decode
//! failures, so a record that exists has already passed these checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// The Analyzer's reading of the user's question. One per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProblemAnalysis {
    pub problem_statement: String,
    pub problem_area: String,
}

/// A candidate approach, produced once per round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Hypothesis {
    pub hypothesis: String,
    #[serde(deserialize_with = "unit_interval")]
    pub confidence: f64,
}

/// A concrete plan built from a hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Solution {
    pub solution: String,
    /// Ordered, never empty.
    #[serde(deserialize_with = "non_empty_steps")]
    pub steps: Vec<String>,
}

/// The Validator's critique of a solution.
///
/// `is_valid` is the model's own verdict. It is kept for the dialogue log only;
/// acceptance is decided by comparing `confidence` with the engine threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
    #[serde(deserialize_with = "unit_interval")]
    pub confidence: f64,
    pub feedback: String,
    #[serde(default)]
    pub missing_aspects: Option<Vec<String>>,
}

/// What a rejected round leaves behind for the next hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub hypothesis: String,
    pub feedback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_aspects: Option<Vec<String>>,
}

impl AttemptRecord {
    pub fn from_round(hypothesis: &Hypothesis, validation: &ValidationResult) -> Self {
        Self {
            hypothesis: hypothesis.hypothesis.clone(),
            feedback: validation.feedback.clone(),
            missing_aspects: validation.missing_aspects.clone(),
        }
    }
}

/// One line of the observability log kept for every session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueEntry {
    pub agent: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl DialogueEntry {
    pub fn new(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

fn unit_interval<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(serde::de::Error::custom(format!(
            "confidence {value} is outside [0, 1]"
        )))
    }
}

fn non_empty_steps<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let steps = Vec::<String>::deserialize(deserializer)?;
    if steps.is_empty() {
        Err(serde::de::Error::custom("solution has no steps"))
    } else {
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reasonloop_core::error::{DecodeError, Error};
    use reasonloop_providers::capability::decode_reply;

    #[test]
    fn hypothesis_missing_confidence_is_decode_error() {
        let result = decode_reply::<Hypothesis>(r#"{"hypothesis":"sleep more"}"#);
        match result {
            Err(Error::Decode(DecodeError::Json { record, source })) => {
                assert_eq!(record, "Hypothesis");
                assert!(source.to_string().contains("confidence"));
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_field_is_rejected() {
        let result = decode_reply::<ProblemAnalysis>(
            r#"{"problem_statement":"s","problem_area":"personal","mood":"calm"}"#,
        );
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn confidence_out_of_range_is_rejected() {
        assert!(decode_reply::<Hypothesis>(r#"{"hypothesis":"h","confidence":1.2}"#).is_err());
        assert!(
            decode_reply::<ValidationResult>(r#"{"confidence":-0.1,"feedback":"f"}"#).is_err()
        );
        let edge: Hypothesis = decode_reply(r#"{"hypothesis":"h","confidence":1.0}"#).unwrap();
        assert!((edge.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn solution_requires_steps() {
        assert!(decode_reply::<Solution>(r#"{"solution":"s","steps":[]}"#).is_err());
        let ok: Solution = decode_reply(r#"{"solution":"s","steps":["a","b"]}"#).unwrap();
        assert_eq!(ok.steps, vec!["a", "b"]);
    }

    #[test]
    fn validation_accepts_legacy_verdict_and_null_aspects() {
        let v: ValidationResult = decode_reply(
            r#"{"is_valid":true,"confidence":0.4,"feedback":"thin","missing_aspects":null}"#,
        )
        .unwrap();
        assert_eq!(v.is_valid, Some(true));
        assert!(v.missing_aspects.is_none());

        let v: ValidationResult =
            decode_reply(r#"{"confidence":0.9,"feedback":"ok","missing_aspects":["cost"]}"#)
                .unwrap();
        assert_eq!(v.is_valid, None);
        assert_eq!(v.missing_aspects, Some(vec!["cost".to_string()]));
    }

    #[test]
    fn attempt_record_copies_round_outputs() {
        let hypothesis = Hypothesis {
            hypothesis: "block distractions".into(),
            confidence: 0.6,
        };
        let validation = ValidationResult {
            is_valid: Some(false),
            confidence: 0.5,
            feedback: "ignores sleep".into(),
            missing_aspects: Some(vec!["sleep".into()]),
        };
        let record = AttemptRecord::from_round(&hypothesis, &validation);
        assert_eq!(record.hypothesis, "block distractions");
        assert_eq!(record.feedback, "ignores sleep");
        assert_eq!(record.missing_aspects, Some(vec!["sleep".to_string()]));
    }
}
