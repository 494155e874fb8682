//! Core data model types for adaptest.
//!
//! Items, responses, logged events and session results shared by the engine
//! and its collaborators.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CatError;

/// Three-parameter logistic item parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemParams {
    /// Discrimination, strictly positive.
    pub a: f64,
    /// Difficulty on the ability scale.
    pub b: f64,
    /// Guessing (lower asymptote), in `[0, 1)`.
    pub c: f64,
}

impl ItemParams {
    /// Upper asymptote of the four-parameter form. Always 1.0; kept for bank exports.
    pub const UPPER_ASYMPTOTE: f64 = 1.0;

    /// Build validated parameters.
    pub fn new(a: f64, b: f64, c: f64) -> Result<Self, CatError> {
        if !(a.is_finite() && a > 0.0) {
            return Err(CatError::validation(format!(
                "discrimination must be positive, got {a}"
            )));
        }
        if !b.is_finite() {
            return Err(CatError::validation(format!(
                "difficulty must be finite, got {b}"
            )));
        }
        if !(0.0..1.0).contains(&c) {
            return Err(CatError::validation(format!(
                "guessing must be in [0, 1), got {c}"
            )));
        }
        Ok(Self { a, b, c })
    }
}

/// One answer option shown to the examinee. The answer key stays in the bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub content: String,
}

/// A raw item bank record. Any IRT parameter may be missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub param_a: Option<f64>,
    #[serde(default)]
    pub param_b: Option<f64>,
    #[serde(default)]
    pub param_c: Option<f64>,
}

/// An item eligible for adaptive selection: all three parameters are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    /// Assignment this item belongs to.
    pub assignment_id: String,
    pub content: String,
    pub choices: Vec<Choice>,
    pub params: ItemParams,
}

impl Item {
    /// Convert a bank record into an eligible item.
    ///
    /// Returns `None` when any parameter is missing or out of range; such
    /// records never reach the selector or the estimator.
    pub fn from_record(record: ItemRecord, assignment_id: &str) -> Option<Self> {
        let (a, b, c) = (record.param_a?, record.param_b?, record.param_c?);
        let params = ItemParams::new(a, b, c).ok()?;
        Some(Self {
            id: record.id,
            assignment_id: assignment_id.to_string(),
            content: record.content,
            choices: record.choices,
            params,
        })
    }
}

/// A scored (dichotomous) response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Response {
    Incorrect,
    Correct,
}

impl Response {
    pub fn is_correct(self) -> bool {
        self == Response::Correct
    }
}

impl From<bool> for Response {
    fn from(correct: bool) -> Self {
        if correct {
            Response::Correct
        } else {
            Response::Incorrect
        }
    }
}

impl From<Response> for u8 {
    fn from(r: Response) -> u8 {
        match r {
            Response::Incorrect => 0,
            Response::Correct => 1,
        }
    }
}

impl TryFrom<u8> for Response {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Response::Incorrect),
            1 => Ok(Response::Correct),
            other => Err(format!("response must be 0 or 1, got {other}")),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// One answered item as seen by the estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub params: ItemParams,
    pub response: Response,
}

/// Key of a stored ability: one value per examinee and course.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbilityKey {
    pub examinee_id: String,
    pub course_id: String,
}

impl AbilityKey {
    pub fn new(examinee_id: impl Into<String>, course_id: impl Into<String>) -> Self {
        Self {
            examinee_id: examinee_id.into(),
            course_id: course_id.into(),
        }
    }
}

impl fmt::Display for AbilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.examinee_id, self.course_id)
    }
}

/// The persisted ability of an examinee in a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAbility {
    pub theta: f64,
    /// Incremented on every successful write; used for compare-and-swap.
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

/// Append-only log entry written for each answered item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEvent {
    pub id: Uuid,
    pub examinee_id: String,
    pub course_id: String,
    pub assignment_id: String,
    pub item_id: String,
    pub response: Response,
    pub ability_before: f64,
    pub ability_after: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Outcome of a submitted session. Created once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub id: Uuid,
    pub examinee_id: String,
    pub course_id: String,
    pub assignment_id: String,
    pub final_theta: f64,
    pub correct_count: usize,
    pub total_count: usize,
    /// Stored ability before the smoothing update.
    pub theta_before: f64,
    /// Stored ability after the smoothing update.
    pub theta_after: f64,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(a: Option<f64>, b: Option<f64>, c: Option<f64>) -> ItemRecord {
        ItemRecord {
            id: "q1".into(),
            content: "What is ownership?".into(),
            choices: vec![],
            param_a: a,
            param_b: b,
            param_c: c,
        }
    }

    #[test]
    fn item_params_validation() {
        assert!(ItemParams::new(1.2, -0.5, 0.2).is_ok());
        assert!(ItemParams::new(0.0, 0.0, 0.2).is_err());
        assert!(ItemParams::new(-1.0, 0.0, 0.2).is_err());
        assert!(ItemParams::new(1.0, f64::NAN, 0.2).is_err());
        assert!(ItemParams::new(1.0, 0.0, 1.0).is_err());
        assert!(ItemParams::new(1.0, 0.0, -0.1).is_err());
    }

    #[test]
    fn incomplete_record_is_not_eligible() {
        assert!(Item::from_record(record(Some(1.0), Some(0.0), Some(0.2)), "a1").is_some());
        assert!(Item::from_record(record(None, Some(0.0), Some(0.2)), "a1").is_none());
        assert!(Item::from_record(record(Some(1.0), None, Some(0.2)), "a1").is_none());
        assert!(Item::from_record(record(Some(1.0), Some(0.0), None), "a1").is_none());
        assert!(Item::from_record(record(Some(1.0), Some(0.0), Some(1.5)), "a1").is_none());
    }

    #[test]
    fn response_serializes_as_bit() {
        assert_eq!(serde_json::to_string(&Response::Correct).unwrap(), "1");
        assert_eq!(
            serde_json::from_str::<Vec<Response>>("[0,1]").unwrap(),
            vec![Response::Incorrect, Response::Correct]
        );
        assert!(serde_json::from_str::<Response>("2").is_err());
    }
}
